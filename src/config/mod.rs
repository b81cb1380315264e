//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (F5XC_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → ExporterConfig (validated, immutable)
//!     → handed to each subsystem at composition time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs (only tenant URL and token are required)
//! - Validation separates syntactic (serde) from semantic checks
//! - Environment wins over file so container deployments need no file at all

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CardinalityConfig, CircuitBreakerConfig, ClientConfig, ExporterConfig, IntervalConfig,
    ObservabilityConfig, RetryConfig, ServerConfig, TenantConfig,
};
