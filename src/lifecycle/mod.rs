//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging → Bind listener → Compose subsystems → Start workers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Trigger broadcast → Server stops accepting
//!     → Scheduler joins workers within a deadline → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Shutdown has a timeout: stragglers are aborted after the deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
