//! # CRD Generator
//!
//! Prints the `Realm` and `Client` CustomResourceDefinitions as one YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::CustomResourceExt;
use keycloak_config_operator::crd::{KeycloakClient, Realm};

fn main() -> anyhow::Result<()> {
    let realm = serde_yaml::to_string(&Realm::crd())?;
    let client = serde_yaml::to_string(&KeycloakClient::crd())?;
    print!("{realm}---\n{client}");
    Ok(())
}
