use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use super::{app_labels, InstanceMeta};
use crate::constants::CONFIG_FILE_KEY;

/// ConfigMap carrying the rendered Dex configuration under `config.yaml`
pub fn config_map(meta: &InstanceMeta, rendered: &str) -> ConfigMap {
    ConfigMap {
        metadata: meta.namespaced_meta(&meta.name, Some(app_labels(&meta.name))),
        data: Some(BTreeMap::from([(
            CONFIG_FILE_KEY.to_string(),
            rendered.to_string(),
        )])),
        ..ConfigMap::default()
    }
}
