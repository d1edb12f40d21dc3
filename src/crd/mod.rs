//! # Custom Resource Definitions
//!
//! CRD types for the Keycloak config operator.
//!
//! ## Module Structure
//!
//! - `realm.rs` - `Realm` resource and its free-form realm representation
//! - `client.rs` - `Client` resource (Rust type `KeycloakClient`) and its realm reference
//! - `connection.rs` - per-resource Keycloak connection overrides
//! - `secret_ref.rs` - references to credentials held inline or in a Secret
//! - `status.rs` - status record shared by both kinds

mod client;
mod connection;
mod realm;
mod secret_ref;
mod status;

pub use client::{Client as KeycloakClient, ClientRepresentation, ClientSpec, RealmRef};
pub use connection::KeycloakConnection;
pub use realm::{Realm, RealmRepresentation, RealmSpec};
pub use secret_ref::SecretRef;
pub use status::{KeycloakStatus, SyncState};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::fmt;

/// Namespaced identity of a Kubernetes object
///
/// Used for primaries (Realm, Client) and for the secondaries they reference
/// (Secrets, Realms). Ordering is namespace first, then name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object; `None` when name or namespace is missing
    pub fn from_meta(meta: &ObjectMeta) -> Option<Self> {
        Some(Self::new(meta.namespace.clone()?, meta.name.clone()?))
    }

    /// Key of a namespaced resource
    pub fn of<K: Resource>(resource: &K) -> Option<Self> {
        Self::from_meta(resource.meta())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Schema for free-form representations passed through to Keycloak untouched
pub(crate) fn preserve_unknown_fields(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}
