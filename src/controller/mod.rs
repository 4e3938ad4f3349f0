//! # Controller
//!
//! DexServer reconciliation: the cluster store abstraction, the existence
//! oracle, secret resolution, configuration translation, mTLS generation,
//! object builders and the bootstrap engine, plus the HTTP server for health checks
//! and metrics.

pub mod backoff;
pub mod builders;
pub mod dex_config;
pub mod mtls;
pub mod oracle;
pub mod reconciler;
pub mod resolver;
pub mod server;
pub mod store;
