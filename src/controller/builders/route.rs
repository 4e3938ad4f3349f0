use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use url::Url;

use super::{instance_labels, BuildError, InstanceMeta};
use crate::constants::WEB_PORT_NAME;
use crate::crd::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};

/// Host component of the issuer URL
pub fn route_host(issuer: &str) -> Result<String, BuildError> {
    let invalid = |reason: String| BuildError::InvalidIssuer {
        issuer: issuer.to_string(),
        reason,
    };
    let url = Url::parse(issuer).map_err(|e| invalid(e.to_string()))?;
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid("URL has no host".to_string()))
}

/// Public route to the primary service, re-encrypting to the serving cert
pub fn route(meta: &InstanceMeta) -> Result<Route, BuildError> {
    let host = route_host(&meta.issuer)?;
    let mut route = Route::new(
        &meta.name,
        RouteSpec {
            host: Some(host),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: meta.name.clone(),
            },
            port: Some(RoutePort {
                target_port: IntOrString::String(WEB_PORT_NAME.to_string()),
            }),
            tls: Some(TlsConfig {
                termination: "reencrypt".to_string(),
                insecure_edge_termination_policy: Some("Redirect".to_string()),
            }),
            wildcard_policy: Some("None".to_string()),
        },
    );
    route.metadata = meta.namespaced_meta(
        &meta.name,
        Some(instance_labels(&meta.name, &meta.namespace)),
    );
    Ok(route)
}
