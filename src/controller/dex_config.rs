//! # Dex Configuration Translator
//!
//! Renders a `DexServer` into the `config.yaml` document Dex reads at startup.
//!
//! Translation happens in two phases:
//!
//! 1. Every connector is checked against its declared type and its credential
//!    is resolved through the [`SecretResolver`]. The first failure aborts the
//!    whole translation, so a document is either complete or not produced at
//!    all.
//! 2. The document is assembled from borrowed data and serialized once. Field
//!    order is fixed by the struct definitions, so identical inputs always
//!    serialize to identical bytes.
//!
//! Listener addresses, storage and TLS paths are fixed. TLS paths are derived
//! from the same mount constants the deployment builder uses.

use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use super::resolver::{ResolveError, SecretResolver};
use crate::constants::{
    CA_CERT_KEY, GRPC_PORT, MTLS_MOUNT_DIR, SERVER_CERT_KEY, SERVER_KEY_KEY, WEB_PORT,
    WEB_TLS_MOUNT_DIR,
};
use crate::crd::{
    ConnectorError, ConnectorSpec, GitHubConfigSpec, GroupSearchSpec, LdapConfigSpec, Org,
    TypedConnector, UserSearchSpec,
};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("connector '{connector}': {source}")]
    Connector {
        connector: String,
        #[source]
        source: ConnectorError,
    },

    #[error("connector '{connector}': {source}")]
    Resolve {
        connector: String,
        #[source]
        source: ResolveError,
    },

    #[error("failed to serialize Dex configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

impl TranslateError {
    pub fn is_transient(&self) -> bool {
        match self {
            TranslateError::Resolve { source, .. } => source.is_transient(),
            TranslateError::Connector { .. } | TranslateError::Serialize(_) => false,
        }
    }
}

/// The Dex configuration document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DexConfig<'a> {
    pub issuer: &'a str,
    pub storage: Storage,
    pub web: Web,
    pub grpc: Grpc,
    pub connectors: Vec<Connector<'a>>,
    pub oauth2: OAuth2,
    #[serde(rename = "enablePasswordDB")]
    pub enable_password_db: bool,
}

#[derive(Debug, Serialize)]
pub struct Storage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub config: StorageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub in_cluster: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Web {
    pub https: String,
    pub tls_cert: String,
    pub tls_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grpc {
    pub addr: String,
    pub tls_cert: String,
    pub tls_key: String,
    #[serde(rename = "tlsClientCA")]
    pub tls_client_ca: String,
    pub reflection: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2 {
    pub skip_approval_screen: bool,
}

#[derive(Debug, Serialize)]
pub struct Connector<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
    pub name: &'a str,
    pub config: ConnectorConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ConnectorConfig<'a> {
    GitHub(GitHubConfig<'a>),
    Ldap(LdapConfig<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubConfig<'a> {
    #[serde(rename = "clientID")]
    pub client_id: &'a str,
    pub client_secret: &'a str,
    #[serde(rename = "redirectURI")]
    pub redirect_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub orgs: &'a [Org],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<&'a str>,
    #[serde(rename = "rootCA", skip_serializing_if = "Option::is_none")]
    pub root_ca: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name_field: Option<&'a str>,
    #[serde(skip_serializing_if = "is_false")]
    pub load_all_groups: bool,
    #[serde(rename = "useLoginAsID", skip_serializing_if = "is_false")]
    pub use_login_as_id: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfig<'a> {
    pub host: &'a str,
    #[serde(rename = "insecureNoSSL")]
    pub insecure_no_ssl: bool,
    pub insecure_skip_verify: bool,
    #[serde(rename = "startTLS")]
    pub start_tls: bool,
    #[serde(rename = "rootCA", skip_serializing_if = "Option::is_none")]
    pub root_ca: Option<&'a str>,
    #[serde(rename = "rootCAData", skip_serializing_if = "Option::is_none")]
    pub root_ca_data: Option<&'a str>,
    #[serde(rename = "bindDN")]
    pub bind_dn: &'a str,
    #[serde(rename = "bindPW")]
    pub bind_pw: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_search: Option<&'a UserSearchSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_search: Option<&'a GroupSearchSpec>,
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if passes a reference")]
fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// A connector with its settings checked and its credential resolved
#[derive(Debug)]
pub struct ResolvedConnector<'a> {
    pub spec: &'a ConnectorSpec,
    pub config: TypedConnector<'a>,
    pub credential: Zeroizing<String>,
}

/// Check and resolve every connector, in declaration order
///
/// Fails on the first connector with an unsupported type, a missing settings
/// section or a credential that cannot be resolved.
pub async fn resolve_connectors<'a>(
    connectors: &'a [ConnectorSpec],
    resolver: &SecretResolver<'_>,
) -> Result<Vec<ResolvedConnector<'a>>, TranslateError> {
    let mut resolved = Vec::with_capacity(connectors.len());
    for spec in connectors {
        let config = spec.typed().map_err(|source| TranslateError::Connector {
            connector: spec.id.clone(),
            source,
        })?;
        let (reference, default_key) = config.credential_ref();
        let credential = resolver
            .resolve(reference, default_key)
            .await
            .map_err(|source| TranslateError::Resolve {
                connector: spec.id.clone(),
                source,
            })?;
        resolved.push(ResolvedConnector {
            spec,
            config,
            credential,
        });
    }
    Ok(resolved)
}

/// Assemble the document from resolved connectors
pub fn build_document<'a>(issuer: &'a str, connectors: &'a [ResolvedConnector<'a>]) -> DexConfig<'a> {
    let connectors = connectors
        .iter()
        .map(|connector| Connector {
            kind: connector.config.kind(),
            id: &connector.spec.id,
            name: &connector.spec.name,
            config: match connector.config {
                TypedConnector::GitHub(github) => {
                    ConnectorConfig::GitHub(github_config(github, &connector.credential))
                }
                TypedConnector::Ldap(ldap) => {
                    ConnectorConfig::Ldap(ldap_config(ldap, &connector.credential))
                }
            },
        })
        .collect();

    DexConfig {
        issuer,
        storage: Storage {
            kind: "kubernetes",
            config: StorageConfig { in_cluster: true },
        },
        web: Web {
            https: format!("0.0.0.0:{WEB_PORT}"),
            tls_cert: format!("{WEB_TLS_MOUNT_DIR}/{SERVER_CERT_KEY}"),
            tls_key: format!("{WEB_TLS_MOUNT_DIR}/{SERVER_KEY_KEY}"),
        },
        grpc: Grpc {
            addr: format!("0.0.0.0:{GRPC_PORT}"),
            tls_cert: format!("{MTLS_MOUNT_DIR}/{SERVER_CERT_KEY}"),
            tls_key: format!("{MTLS_MOUNT_DIR}/{SERVER_KEY_KEY}"),
            tls_client_ca: format!("{MTLS_MOUNT_DIR}/{CA_CERT_KEY}"),
            reflection: true,
        },
        connectors,
        oauth2: OAuth2 {
            skip_approval_screen: true,
        },
        enable_password_db: true,
    }
}

fn github_config<'a>(github: &'a GitHubConfigSpec, client_secret: &'a str) -> GitHubConfig<'a> {
    GitHubConfig {
        client_id: &github.client_id,
        client_secret,
        redirect_uri: &github.redirect_uri,
        org: non_empty(github.org.as_ref()),
        orgs: &github.orgs,
        host_name: non_empty(github.host_name.as_ref()),
        root_ca: non_empty(github.root_ca.as_ref()),
        team_name_field: non_empty(github.team_name_field.as_ref()),
        load_all_groups: github.load_all_groups,
        use_login_as_id: github.use_login_as_id,
    }
}

fn ldap_config<'a>(ldap: &'a LdapConfigSpec, bind_pw: &'a str) -> LdapConfig<'a> {
    LdapConfig {
        host: &ldap.host,
        insecure_no_ssl: ldap.insecure_no_ssl,
        insecure_skip_verify: ldap.insecure_skip_verify,
        start_tls: ldap.start_tls,
        root_ca: non_empty(ldap.root_ca.as_ref()),
        root_ca_data: non_empty(ldap.root_ca_data.as_ref()),
        bind_dn: &ldap.bind_dn,
        bind_pw,
        username_prompt: non_empty(ldap.username_prompt.as_ref()),
        user_search: Some(&ldap.user_search).filter(|search| !search.base_dn.is_empty()),
        group_search: Some(&ldap.group_search).filter(|search| !search.base_dn.is_empty()),
    }
}

/// Serialize a document to YAML
pub fn render(document: &DexConfig<'_>) -> Result<Zeroizing<String>, TranslateError> {
    Ok(Zeroizing::new(serde_yaml::to_string(document)?))
}

/// Resolve credentials, assemble and serialize the configuration document
pub async fn translate(
    issuer: &str,
    connectors: &[ConnectorSpec],
    resolver: &SecretResolver<'_>,
) -> Result<Zeroizing<String>, TranslateError> {
    let resolved = resolve_connectors(connectors, resolver).await?;
    render(&build_document(issuer, &resolved))
}
