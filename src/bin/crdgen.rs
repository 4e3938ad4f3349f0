//! Prints the DexServer CustomResourceDefinition as YAML.
//!
//! ```sh
//! cargo run --bin crdgen > config/crd/dexserver.yaml
//! ```

use anyhow::{Context, Result};
use kube::CustomResourceExt;

use dex_operator::crd::DexServer;

fn main() -> Result<()> {
    let crd = serde_yaml::to_string(&DexServer::crd()).context("Failed to serialize CRD")?;
    print!("{crd}");
    Ok(())
}
