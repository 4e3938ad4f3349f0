//! # gRPC Mutual TLS
//!
//! Generates the certificate bundle securing the Dex gRPC management listener:
//! a self-signed CA, a server certificate for the `grpc` service and a client
//! certificate for API consumers, both issued by that CA.
//!
//! Material is generated per call and handed straight to the secret builder.
//! Nothing is cached; the `grpc-mtls` secret is the only durable copy.

use std::collections::BTreeMap;

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::constants::{
    CA_CERT_KEY, CA_KEY_KEY, CLIENT_CERT_KEY, CLIENT_KEY_KEY, GRPC_SERVICE_NAME,
    SERVER_CERT_KEY, SERVER_KEY_KEY,
};

/// Validity of the generated CA (10 years)
pub const CA_VALIDITY_DAYS: i64 = 3650;

/// Validity of the server and client certificates (1 year)
pub const CERT_VALIDITY_DAYS: i64 = 365;

const ORGANIZATION: &str = "Dex Operator";

/// mTLS generation errors
#[derive(Debug, Error)]
pub enum MtlsError {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[source] rcgen::Error),

    #[error("failed to issue {what} certificate: {source}")]
    Certificate {
        what: &'static str,
        #[source]
        source: rcgen::Error,
    },

    #[error("invalid DNS name '{name}': {source}")]
    InvalidDnsName {
        name: String,
        #[source]
        source: rcgen::Error,
    },
}

/// PEM-encoded CA, server and client material
///
/// Each field holds exactly one PEM block.
pub struct MtlsBundle {
    pub ca_cert: String,
    pub ca_key: Zeroizing<String>,
    pub server_cert: String,
    pub server_key: Zeroizing<String>,
    pub client_cert: String,
    pub client_key: Zeroizing<String>,
}

impl std::fmt::Debug for MtlsBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MtlsBundle")
            .field("ca_cert", &self.ca_cert)
            .field("server_cert", &self.server_cert)
            .field("client_cert", &self.client_cert)
            .finish_non_exhaustive()
    }
}

impl MtlsBundle {
    /// Generate a fresh bundle for the gRPC service in `namespace`
    pub fn generate(namespace: &str) -> Result<Self, MtlsError> {
        let ca_key = KeyPair::generate().map_err(MtlsError::KeyGeneration)?;
        let ca_params = ca_params();
        let ca_cert = ca_params
            .self_signed(&ca_key)
            .map_err(|source| MtlsError::Certificate { what: "CA", source })?;
        let issuer = Issuer::from_params(&ca_params, &ca_key);

        let server_key = KeyPair::generate().map_err(MtlsError::KeyGeneration)?;
        let server_cert = leaf_params(
            "dex-grpc-server",
            ExtendedKeyUsagePurpose::ServerAuth,
            &server_dns_names(namespace),
        )?
        .signed_by(&server_key, &issuer)
        .map_err(|source| MtlsError::Certificate {
            what: "server",
            source,
        })?;

        let client_key = KeyPair::generate().map_err(MtlsError::KeyGeneration)?;
        let client_cert = leaf_params("dex-grpc-client", ExtendedKeyUsagePurpose::ClientAuth, &[])?
            .signed_by(&client_key, &issuer)
            .map_err(|source| MtlsError::Certificate {
                what: "client",
                source,
            })?;

        Ok(Self {
            ca_cert: ca_cert.pem(),
            ca_key: Zeroizing::new(ca_key.serialize_pem()),
            server_cert: server_cert.pem(),
            server_key: Zeroizing::new(server_key.serialize_pem()),
            client_cert: client_cert.pem(),
            client_key: Zeroizing::new(client_key.serialize_pem()),
        })
    }

    /// Secret data keyed by the fixed mTLS field names
    pub fn into_secret_data(self) -> BTreeMap<String, Zeroizing<String>> {
        BTreeMap::from([
            (CA_CERT_KEY.to_string(), Zeroizing::new(self.ca_cert)),
            (CA_KEY_KEY.to_string(), self.ca_key),
            (SERVER_CERT_KEY.to_string(), Zeroizing::new(self.server_cert)),
            (SERVER_KEY_KEY.to_string(), self.server_key),
            (CLIENT_CERT_KEY.to_string(), Zeroizing::new(self.client_cert)),
            (CLIENT_KEY_KEY.to_string(), self.client_key),
        ])
    }
}

/// DNS names the gRPC service answers to inside the cluster
pub fn server_dns_names(namespace: &str) -> Vec<String> {
    vec![
        GRPC_SERVICE_NAME.to_string(),
        format!("{GRPC_SERVICE_NAME}.{namespace}.svc"),
        format!("{GRPC_SERVICE_NAME}.{namespace}.svc.cluster.local"),
    ]
}

fn validity(days: i64) -> (time::OffsetDateTime, time::OffsetDateTime) {
    let now = time::OffsetDateTime::now_utc();
    (now, now + time::Duration::days(days))
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(common_name.to_string()),
    );
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String(ORGANIZATION.to_string()),
    );
    dn
}

fn ca_params() -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name("dex-grpc-ca");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let (not_before, not_after) = validity(CA_VALIDITY_DAYS);
    params.not_before = not_before;
    params.not_after = not_after;
    params
}

fn leaf_params(
    common_name: &str,
    usage: ExtendedKeyUsagePurpose,
    dns_names: &[String],
) -> Result<CertificateParams, MtlsError> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(common_name);
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![usage];
    let (not_before, not_after) = validity(CERT_VALIDITY_DAYS);
    params.not_before = not_before;
    params.not_after = not_after;
    params.subject_alt_names = dns_names
        .iter()
        .map(|name| {
            Ia5String::try_from(name.clone())
                .map(SanType::DnsName)
                .map_err(|source| MtlsError::InvalidDnsName {
                    name: name.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

    fn single_block(pem_text: &str) -> ::pem::Pem {
        let blocks = ::pem::parse_many(pem_text.as_bytes()).unwrap();
        assert_eq!(blocks.len(), 1, "expected exactly one PEM block");
        blocks.into_iter().next().unwrap()
    }

    #[test]
    fn test_every_field_is_a_single_pem_block() {
        let bundle = MtlsBundle::generate("dex").unwrap();
        for cert in [&bundle.ca_cert, &bundle.server_cert, &bundle.client_cert] {
            assert_eq!(single_block(cert).tag(), "CERTIFICATE");
        }
        for key in [&bundle.ca_key, &bundle.server_key, &bundle.client_key] {
            assert_eq!(single_block(key).tag(), "PRIVATE KEY");
        }
    }

    #[test]
    fn test_leaf_certificates_are_issued_by_the_ca() {
        let bundle = MtlsBundle::generate("dex").unwrap();
        let ca_der = single_block(&bundle.ca_cert);
        let (_, ca) = X509Certificate::from_der(ca_der.contents()).unwrap();
        assert!(ca.is_ca());

        for leaf_pem in [&bundle.server_cert, &bundle.client_cert] {
            let der = single_block(leaf_pem);
            let (_, leaf) = X509Certificate::from_der(der.contents()).unwrap();
            assert_eq!(leaf.issuer(), ca.subject());
            assert!(!leaf.is_ca());
            leaf.verify_signature(Some(ca.public_key())).unwrap();
        }
    }

    #[test]
    fn test_server_certificate_names_the_grpc_service() {
        let bundle = MtlsBundle::generate("dex-system").unwrap();
        let der = single_block(&bundle.server_cert);
        let (_, cert) = X509Certificate::from_der(der.contents()).unwrap();
        let san = cert.subject_alternative_name().unwrap().unwrap();
        let names: Vec<String> = san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some((*dns).to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(names, server_dns_names("dex-system"));
    }

    #[test]
    fn test_bundles_are_fresh_per_call() {
        let first = MtlsBundle::generate("dex").unwrap();
        let second = MtlsBundle::generate("dex").unwrap();
        assert_ne!(first.ca_cert, second.ca_cert);
        assert_ne!(*first.ca_key, *second.ca_key);
    }

    #[test]
    fn test_secret_data_uses_fixed_field_names() {
        let data = MtlsBundle::generate("dex").unwrap().into_secret_data();
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["ca.crt", "ca.key", "client.crt", "client.key", "tls.crt", "tls.key"]
        );
    }
}
