use std::collections::BTreeMap;

/// `app: <name>`, used on secrets, config maps, services and service accounts
pub fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

/// Labels identifying the Dex workload of one DexServer
pub fn instance_labels(name: &str, namespace: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), name.to_string()),
        ("dexconfig_name".to_string(), name.to_string()),
        ("dexconfig_namespace".to_string(), namespace.to_string()),
    ])
}
