//! # Connector Configuration
//!
//! Identity connector declarations carried by a `DexServer`.
//!
//! A connector names its kind in `type` and carries the matching settings
//! section (`github` or `ldap`). The CRD schema restricts `type` to the known
//! kinds. Anything that still decodes with an unknown kind, or without the
//! section its kind requires, is rejected by [`ConnectorSpec::typed`] when the
//! Dex configuration is rendered, so the translator only ever matches over
//! [`TypedConnector`].
//!
//! Credentials are never stored inline: they are [`SecretKeyRef`] indirections
//! resolved when the Dex configuration is generated.

use std::borrow::Cow;

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{GITHUB_CLIENT_SECRET_KEY, LDAP_BIND_PW_KEY};

const GITHUB: &str = "github";
const LDAP: &str = "ldap";

/// Value of a connector's `type` field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectorType {
    GitHub,
    Ldap,
    /// A kind this controller cannot render
    Unsupported(String),
}

impl ConnectorType {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectorType::GitHub => GITHUB,
            ConnectorType::Ldap => LDAP,
            ConnectorType::Unsupported(kind) => kind,
        }
    }
}

impl From<String> for ConnectorType {
    fn from(value: String) -> Self {
        match value.as_str() {
            GITHUB => ConnectorType::GitHub,
            LDAP => ConnectorType::Ldap,
            _ => ConnectorType::Unsupported(value),
        }
    }
}

impl From<ConnectorType> for String {
    fn from(value: ConnectorType) -> Self {
        match value {
            ConnectorType::Unsupported(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl JsonSchema for ConnectorType {
    fn inline_schema() -> bool {
        true
    }

    fn schema_name() -> Cow<'static, str> {
        "ConnectorType".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        schemars::json_schema!({
            "type": "string",
            "enum": [GITHUB, LDAP],
        })
    }
}

/// A connector that cannot be rendered
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("unsupported connector type '{0}'")]
    UnsupportedType(String),

    #[error("connector of type '{kind}' has no '{kind}' section")]
    MissingSection { kind: &'static str },
}

/// An identity connector declaration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ConnectorSpec {
    /// Connector kind: `github` or `ldap`
    #[serde(rename = "type")]
    pub kind: ConnectorType,
    /// Connector ID, as referenced by Dex clients
    pub id: String,
    /// Display name shown on the login page
    pub name: String,
    /// Settings for `type: github`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubConfigSpec>,
    /// Settings for `type: ldap`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap: Option<LdapConfigSpec>,
}

impl ConnectorSpec {
    pub fn github(id: impl Into<String>, name: impl Into<String>, github: GitHubConfigSpec) -> Self {
        Self {
            kind: ConnectorType::GitHub,
            id: id.into(),
            name: name.into(),
            github: Some(github),
            ldap: None,
        }
    }

    pub fn ldap(id: impl Into<String>, name: impl Into<String>, ldap: LdapConfigSpec) -> Self {
        Self {
            kind: ConnectorType::Ldap,
            id: id.into(),
            name: name.into(),
            github: None,
            ldap: Some(ldap),
        }
    }

    /// The settings section selected by `type`
    pub fn typed(&self) -> Result<TypedConnector<'_>, ConnectorError> {
        match &self.kind {
            ConnectorType::GitHub => self
                .github
                .as_ref()
                .map(TypedConnector::GitHub)
                .ok_or(ConnectorError::MissingSection { kind: GITHUB }),
            ConnectorType::Ldap => self
                .ldap
                .as_ref()
                .map(TypedConnector::Ldap)
                .ok_or(ConnectorError::MissingSection { kind: LDAP }),
            ConnectorType::Unsupported(kind) => Err(ConnectorError::UnsupportedType(kind.clone())),
        }
    }
}

/// Settings of a connector whose kind and section agree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedConnector<'a> {
    GitHub(&'a GitHubConfigSpec),
    Ldap(&'a LdapConfigSpec),
}

impl TypedConnector<'_> {
    /// Connector type as written in the Dex configuration
    pub fn kind(&self) -> &'static str {
        match self {
            TypedConnector::GitHub(_) => GITHUB,
            TypedConnector::Ldap(_) => LDAP,
        }
    }

    /// Secret reference for this connector's credential, with the secret field
    /// to read when the reference does not name one
    pub fn credential_ref(&self) -> (&SecretKeyRef, &'static str) {
        match self {
            TypedConnector::GitHub(github) => (&github.client_secret_ref, GITHUB_CLIENT_SECRET_KEY),
            TypedConnector::Ldap(ldap) => (&ldap.bind_pw_ref, LDAP_BIND_PW_KEY),
        }
    }
}

/// Reference to one field of a Kubernetes Secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Secret name
    pub name: String,
    /// Secret namespace
    /// Defaults to the DexServer namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Field of the secret holding the value
    /// Defaults to `clientSecret` for GitHub and `bindPW` for LDAP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// GitHub connector settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitHubConfigSpec {
    /// OAuth application client ID
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Secret holding the OAuth client secret
    pub client_secret_ref: SecretKeyRef,
    /// OAuth callback URL
    #[serde(rename = "redirectURI")]
    pub redirect_uri: String,
    /// Legacy single-organization restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Organizations (and optionally teams) allowed to log in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orgs: Vec<Org>,
    /// GitHub Enterprise host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    /// CA bundle path for GitHub Enterprise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_ca: Option<String>,
    /// Team name format: name, slug or both
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name_field: Option<String>,
    #[serde(default)]
    pub load_all_groups: bool,
    #[serde(default, rename = "useLoginAsID")]
    pub use_login_as_id: bool,
}

/// GitHub organization restriction
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Org {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,
}

/// LDAP connector settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LdapConfigSpec {
    /// host:port of the directory server
    pub host: String,
    /// Plain LDAP without TLS
    #[serde(default, rename = "insecureNoSSL")]
    pub insecure_no_ssl: bool,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default, rename = "startTLS")]
    pub start_tls: bool,
    /// Path of a CA bundle inside the Dex container
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "rootCA")]
    pub root_ca: Option<String>,
    /// Base64-encoded PEM CA bundle
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "rootCAData")]
    pub root_ca_data: Option<String>,
    /// DN used to bind for searches
    #[serde(default, rename = "bindDN")]
    pub bind_dn: String,
    /// Secret holding the bind password
    #[serde(rename = "bindPWRef")]
    pub bind_pw_ref: SecretKeyRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prompt: Option<String>,
    #[serde(default)]
    pub user_search: UserSearchSpec,
    #[serde(default)]
    pub group_search: GroupSearchSpec,
}

/// LDAP user search; ignored when `baseDN` is empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchSpec {
    #[serde(default, rename = "baseDN")]
    pub base_dn: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub id_attr: String,
    #[serde(default)]
    pub email_attr: String,
    #[serde(default)]
    pub name_attr: String,
}

/// LDAP group search; ignored when `baseDN` is empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupSearchSpec {
    #[serde(default, rename = "baseDN")]
    pub base_dn: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub user_matchers: Vec<UserMatcher>,
    #[serde(default)]
    pub name_attr: String,
}

/// Pairs a user attribute with the group attribute that must match it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserMatcher {
    pub user_attr: String,
    pub group_attr: String,
}
