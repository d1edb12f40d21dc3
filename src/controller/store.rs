//! # Stores
//!
//! Read access to the Kubernetes objects reconcilers look up: Secrets holding
//! credentials and the Realm a Client points at. Reads always go to the API
//! server so rotated secrets are seen on the next reconciliation.

use crate::crd::Realm;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Decoded data of a Secret, keyed by entry name
pub type SecretData = BTreeMap<String, Vec<u8>>;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Data of the Secret `namespace/name`, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, kube::Error>;
}

#[async_trait]
pub trait RealmStore: Send + Sync {
    /// The Realm resource `namespace/name`, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Realm>, kube::Error>;
}

/// Stores backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, kube::Error> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        // ByteString values arrive base64-decoded from the API response
        Ok(secrets.get_opt(name).await?.map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}

#[async_trait]
impl RealmStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Realm>, kube::Error> {
        let realms: Api<Realm> = Api::namespaced(self.client.clone(), namespace);
        realms.get_opt(name).await
    }
}
