//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables.
//!
//! All settings have sensible defaults and can be overridden via environment
//! variables set on the operator deployment. The Dex image has no default and
//! must be supplied through `RELATED_IMAGE_DEX` before any Deployment can be
//! built.

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Parse a variable from `lookup` or fall back to `default`
///
/// Unparseable values fall back to the default as well.
fn var_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
