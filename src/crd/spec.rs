//! # DexServer Specification
//!
//! The `DexServer` custom resource: one declarative description of a Dex
//! deployment (issuer plus identity connectors).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::connector::ConnectorSpec;

/// DexServer Custom Resource Definition
///
/// Every object the controller creates for a `DexServer` is owned by it and is
/// garbage collected together with it.
///
/// # Example
///
/// ```yaml
/// apiVersion: auth.identitatem.io/v1alpha1
/// kind: DexServer
/// metadata:
///   name: dex
///   namespace: dex-system
/// spec:
///   issuer: https://sso.example.com/
///   connectors:
///     - type: github
///       id: gh
///       name: GitHub
///       github:
///         clientID: abc
///         clientSecretRef:
///           name: gh-secret
///         redirectURI: https://sso.example.com/callback
///         org: example
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "DexServer",
    group = "auth.identitatem.io",
    version = "v1alpha1",
    namespaced,
    shortname = "dexs",
    printcolumn = r#"{"name":"Issuer", "type":"string", "jsonPath":".spec.issuer"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DexServerSpec {
    /// Public issuer URL of the Dex server
    /// The route host is derived from this URL
    pub issuer: String,
    /// Identity connectors, in the order Dex should present them
    #[serde(default)]
    pub connectors: Vec<ConnectorSpec>,
}
