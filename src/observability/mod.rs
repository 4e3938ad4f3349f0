//! # Observability
//!
//! Prometheus metrics for the Dex operator. Logging goes through `tracing`
//! and is configured in [`crate::runtime::initialization`].

pub mod metrics;
