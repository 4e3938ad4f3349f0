//! # Custom Resource Definitions
//!
//! CRD types for the Dex operator.
//!
//! `DexServer` is the resource this controller owns and serves. `Route` is the
//! OpenShift ingress type it creates for each Dex server.

mod connector;
mod route;
mod spec;

pub use connector::{
    ConnectorError, ConnectorSpec, ConnectorType, GitHubConfigSpec, GroupSearchSpec,
    LdapConfigSpec, Org, SecretKeyRef, TypedConnector, UserMatcher, UserSearchSpec,
};
pub use route::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};
pub use spec::{DexServer, DexServerSpec};
