use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, KeyToPath, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::{instance_labels, web_tls_secret_name, BuildError, InstanceMeta};
use crate::constants::{
    CONFIG_FILE_KEY, CONFIG_MOUNT_DIR, DEX_BINARY, GRPC_PORT, GRPC_PORT_NAME, MTLS_MOUNT_DIR,
    MTLS_SECRET_NAME, SERVICE_ACCOUNT_NAME, WEB_CONTAINER_PORT_NAME, WEB_PORT, WEB_TLS_MOUNT_DIR,
};

const CONFIG_VOLUME: &str = "config";
const TLS_VOLUME: &str = "tls";
const MTLS_VOLUME: &str = "mtls";

/// Single-replica Dex deployment
///
/// Fails with [`BuildError::MissingImage`] when no image is configured.
pub fn deployment(meta: &InstanceMeta, image: Option<&str>) -> Result<Deployment, BuildError> {
    let image = image
        .filter(|i| !i.trim().is_empty())
        .ok_or(BuildError::MissingImage)?;
    let labels = instance_labels(&meta.name, &meta.namespace);

    let container = Container {
        name: meta.name.clone(),
        image: Some(image.to_string()),
        image_pull_policy: Some("Always".to_string()),
        command: Some(vec![
            DEX_BINARY.to_string(),
            "serve".to_string(),
            format!("{CONFIG_MOUNT_DIR}/{CONFIG_FILE_KEY}"),
        ]),
        env: Some(vec![EnvVar {
            name: "KUBERNETES_POD_NAMESPACE".to_string(),
            value: Some(meta.namespace.clone()),
            ..EnvVar::default()
        }]),
        ports: Some(vec![
            ContainerPort {
                container_port: WEB_PORT,
                name: Some(WEB_CONTAINER_PORT_NAME.to_string()),
                ..ContainerPort::default()
            },
            ContainerPort {
                container_port: GRPC_PORT,
                name: Some(GRPC_PORT_NAME.to_string()),
                ..ContainerPort::default()
            },
        ]),
        volume_mounts: Some(vec![
            volume_mount(CONFIG_VOLUME, CONFIG_MOUNT_DIR),
            volume_mount(TLS_VOLUME, WEB_TLS_MOUNT_DIR),
            volume_mount(MTLS_VOLUME, MTLS_MOUNT_DIR),
        ]),
        ..Container::default()
    };

    let volumes = vec![
        Volume {
            name: CONFIG_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: meta.name.clone(),
                items: Some(vec![KeyToPath {
                    key: CONFIG_FILE_KEY.to_string(),
                    path: CONFIG_FILE_KEY.to_string(),
                    ..KeyToPath::default()
                }]),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        },
        secret_volume(TLS_VOLUME, web_tls_secret_name(&meta.name)),
        secret_volume(MTLS_VOLUME, MTLS_SECRET_NAME.to_string()),
    ];

    Ok(Deployment {
        metadata: meta.namespaced_meta(&meta.name, None),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(volumes),
                    service_account_name: Some(SERVICE_ACCOUNT_NAME.to_string()),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}

fn volume_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..VolumeMount::default()
    }
}

fn secret_volume(name: &str, secret_name: String) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name),
            ..SecretVolumeSource::default()
        }),
        ..Volume::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::builders::test_support::meta;

    #[test]
    fn test_missing_image_is_a_build_error() {
        assert_eq!(deployment(&meta(), None), Err(BuildError::MissingImage));
        assert_eq!(deployment(&meta(), Some("")), Err(BuildError::MissingImage));
    }

    #[test]
    fn test_deployment_shape() {
        let dep = deployment(&meta(), Some("quay.io/dexidp/dex:v2.37.0")).unwrap();
        let spec = dep.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        let labels = spec.selector.match_labels.unwrap();
        assert_eq!(labels["dexconfig_namespace"], "dex-system");

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.service_account_name.as_deref(), Some("dex-operator-dexsso"));
        let container = &pod.containers[0];
        assert_eq!(container.name, "dex");
        assert_eq!(container.image.as_deref(), Some("quay.io/dexidp/dex:v2.37.0"));
        assert_eq!(
            container.command,
            Some(vec![
                "/usr/local/bin/dex".to_string(),
                "serve".to_string(),
                "/etc/dex/cfg/config.yaml".to_string()
            ])
        );
        let mounts: Vec<(&str, &str)> = container
            .volume_mounts
            .as_ref()
            .unwrap()
            .iter()
            .map(|m| (m.name.as_str(), m.mount_path.as_str()))
            .collect();
        assert_eq!(
            mounts,
            vec![
                ("config", "/etc/dex/cfg"),
                ("tls", "/etc/dex/tls"),
                ("mtls", "/etc/dex/mtls")
            ]
        );

        let volumes = pod.volumes.unwrap();
        assert_eq!(
            volumes[1].secret.as_ref().unwrap().secret_name.as_deref(),
            Some("dex-tls-secret")
        );
        assert_eq!(
            volumes[2].secret.as_ref().unwrap().secret_name.as_deref(),
            Some("grpc-mtls")
        );
    }
}
