//! F5 Distributed Cloud Prometheus exporter library.

pub mod cardinality;
pub mod client;
pub mod collectors;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod scheduler;

pub use config::ExporterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
