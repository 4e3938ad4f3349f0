use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};

use super::{app_labels, InstanceMeta};
use crate::constants::{
    GRPC_PORT, GRPC_PORT_NAME, GRPC_SERVICE_NAME, WEB_PORT, WEB_PORT_NAME, WEB_TLS_SECRET_SUFFIX,
};

/// OpenShift generates a serving certificate into the secret named here
pub const SERVING_CERT_ANNOTATION: &str = "service.beta.openshift.io/serving-cert-secret-name";

/// Name of the serving-cert secret backing the web listener
pub fn web_tls_secret_name(instance_name: &str) -> String {
    format!("{instance_name}{WEB_TLS_SECRET_SUFFIX}")
}

fn cluster_ip_spec(instance_name: &str, port: i32, port_name: &str) -> ServiceSpec {
    ServiceSpec {
        type_: Some("ClusterIP".to_string()),
        ports: Some(vec![ServicePort {
            port,
            protocol: Some("TCP".to_string()),
            name: Some(port_name.to_string()),
            ..ServicePort::default()
        }]),
        selector: Some(app_labels(instance_name)),
        ..ServiceSpec::default()
    }
}

/// Service exposing the Dex web listener
pub fn primary_service(meta: &InstanceMeta) -> Service {
    let mut metadata = meta.namespaced_meta(&meta.name, Some(app_labels(&meta.name)));
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_ANNOTATION.to_string(),
        web_tls_secret_name(&meta.name),
    )]));
    Service {
        metadata,
        spec: Some(cluster_ip_spec(&meta.name, WEB_PORT, WEB_PORT_NAME)),
        ..Service::default()
    }
}

/// Service exposing the Dex gRPC management listener
pub fn grpc_service(meta: &InstanceMeta) -> Service {
    Service {
        metadata: meta.namespaced_meta(GRPC_SERVICE_NAME, Some(app_labels(&meta.name))),
        spec: Some(cluster_ip_spec(&meta.name, GRPC_PORT, GRPC_PORT_NAME)),
        ..Service::default()
    }
}
