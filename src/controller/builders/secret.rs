use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;

use super::{app_labels, InstanceMeta};
use crate::constants::MTLS_SECRET_NAME;
use crate::controller::mtls::MtlsBundle;

/// The `grpc-mtls` secret holding the gRPC CA, server and client material
pub fn mtls_secret(meta: &InstanceMeta, bundle: MtlsBundle) -> Secret {
    let data = bundle
        .into_secret_data()
        .into_iter()
        .map(|(key, value)| (key, ByteString(value.as_bytes().to_vec())))
        .collect();
    Secret {
        metadata: meta.namespaced_meta(MTLS_SECRET_NAME, Some(app_labels(&meta.name))),
        data: Some(data),
        ..Secret::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::test_support::meta;

    #[test]
    fn test_mtls_secret_shape() {
        let meta = meta();
        let bundle = MtlsBundle::generate(&meta.namespace).unwrap();
        let server_cert = bundle.server_cert.clone();
        let secret = mtls_secret(&meta, bundle);

        assert_eq!(secret.metadata.name.as_deref(), Some("grpc-mtls"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("dex-system"));
        assert_eq!(secret.metadata.owner_references, Some(vec![meta.owner.clone()]));
        let data = secret.data.unwrap();
        assert_eq!(data.len(), 6);
        assert_eq!(data["tls.crt"].0, server_cert.into_bytes());
    }
}
