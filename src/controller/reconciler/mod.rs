//! # Reconciler
//!
//! Reconciliation core for `Realm` and `Client` resources.
//!
//! Both kinds share one contract, [`KeycloakResource`]:
//!
//! - `apply` registers the resource's dependencies, resolves its connection,
//!   imports it into Keycloak and returns the status to persist. Failures
//!   are folded into an `ERROR` status instead of being returned.
//! - `cleanup` unregisters the dependencies and deletes the external entity,
//!   telling the caller whether the finalizer may be removed.
//!
//! Neither touches the Kubernetes API for writes; persisting the status and
//! handling the finalizer is done by [`status`] on behalf of the runtime.

pub mod client;
pub mod realm;
pub mod status;
pub mod types;

pub use types::{BackoffState, Cleanup, Reconciler, ReconcilerError};

use crate::crd::{KeycloakStatus, ResourceKey};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

/// A resource kind the operator mirrors into Keycloak
#[async_trait]
pub trait KeycloakResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Kind name used in logs and metric labels
    const KIND: &'static str;

    fn keycloak_status(&self) -> Option<&KeycloakStatus>;

    /// Reconcile towards the spec and return the resulting status
    async fn apply(&self, reconciler: &Reconciler) -> KeycloakStatus;

    /// Undo the external side effects of the resource
    async fn cleanup(&self, reconciler: &Reconciler) -> Cleanup;
}

/// Key of a primary; namespaced kinds always have one once stored
pub(crate) fn primary_key<K: KeycloakResource>(resource: &K) -> Result<ResourceKey, ReconcilerError> {
    ResourceKey::of(resource).ok_or_else(|| {
        ReconcilerError::InvalidResource(format!("{} without namespace or name", K::KIND))
    })
}

/// Bound `work` by the reconcile timeout
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    work: impl Future<Output = Result<T, ReconcilerError>>,
) -> Result<T, ReconcilerError> {
    tokio::time::timeout(timeout, work)
        .await
        .unwrap_or(Err(ReconcilerError::Timeout(timeout)))
}
