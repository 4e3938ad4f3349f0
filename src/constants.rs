//! # Constants
//!
//! Fixed names, ports, paths and defaults shared by the builders, the
//! configuration translator and the runtime.

// Object names shared by every DexServer in a scope.
// These are single-tenant on purpose until multi-instance support is decided.

/// Secret holding the gRPC mutual-TLS bundle
pub const MTLS_SECRET_NAME: &str = "grpc-mtls";

/// Suffix of the serving-cert secret generated for the web listener
pub const WEB_TLS_SECRET_SUFFIX: &str = "-tls-secret";

/// ServiceAccount, ClusterRole and ClusterRoleBinding prefix
pub const SERVICE_ACCOUNT_NAME: &str = "dex-operator-dexsso";

/// Service exposing the Dex gRPC management API
pub const GRPC_SERVICE_NAME: &str = "grpc";

/// Environment variable carrying the Dex container image reference
pub const DEX_IMAGE_ENV_NAME: &str = "RELATED_IMAGE_DEX";

// Listener ports

pub const WEB_PORT: i32 = 5556;
pub const GRPC_PORT: i32 = 5557;

pub const WEB_PORT_NAME: &str = "http";
pub const WEB_CONTAINER_PORT_NAME: &str = "https";
pub const GRPC_PORT_NAME: &str = "grpc";

// Mount points inside the Dex container.
// The configuration document refers to files below these directories.

pub const CONFIG_MOUNT_DIR: &str = "/etc/dex/cfg";
pub const WEB_TLS_MOUNT_DIR: &str = "/etc/dex/tls";
pub const MTLS_MOUNT_DIR: &str = "/etc/dex/mtls";

/// ConfigMap key holding the Dex configuration
pub const CONFIG_FILE_KEY: &str = "config.yaml";

pub const DEX_BINARY: &str = "/usr/local/bin/dex";

// Keys of the mTLS secret

pub const CA_CERT_KEY: &str = "ca.crt";
pub const CA_KEY_KEY: &str = "ca.key";
pub const SERVER_CERT_KEY: &str = "tls.crt";
pub const SERVER_KEY_KEY: &str = "tls.key";
pub const CLIENT_CERT_KEY: &str = "client.crt";
pub const CLIENT_KEY_KEY: &str = "client.key";

// Default secret fields for connector credentials

pub const GITHUB_CLIENT_SECRET_KEY: &str = "clientSecret";
pub const LDAP_BIND_PW_KEY: &str = "bindPW";

/// Field manager / reporter name used against the API server
pub const CONTROLLER_NAME: &str = "dex-operator";

// Runtime defaults (overridable through environment variables)

pub const DEFAULT_METRICS_PORT: u16 = 8080;
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STEP_REQUEUE_SECS: u64 = 1;
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Safety requeue after a configuration error (seconds)
pub const CONFIGURATION_ERROR_REQUEUE_SECS: u64 = 600;
