//! # Status and Finalizer Updates
//!
//! Writes computed status records and the cleanup finalizer back to the
//! Kubernetes API.
//!
//! Every patch carries the `resourceVersion` the reconciliation read, so a
//! concurrent writer makes the patch fail with 409 instead of being merged
//! over. Conflicts surface as [`ReconcilerError::StatusConflict`] and the
//! runtime re-runs the whole reconciliation against the fresh object.

use crate::constants::{FIELD_MANAGER, FINALIZER};
use crate::controller::reconciler::{KeycloakResource, ReconcilerError};
use crate::crd::KeycloakStatus;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

fn api_for<K: KeycloakResource>(client: &Client, resource: &K) -> Api<K> {
    match resource.namespace() {
        Some(namespace) => Api::namespaced(client.clone(), &namespace),
        None => Api::default_namespaced(client.clone()),
    }
}

fn map_conflict<K: KeycloakResource>(resource: &K, error: kube::Error) -> ReconcilerError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 409 => ReconcilerError::StatusConflict(
            format!("{}/{}", resource.namespace().unwrap_or_default(), resource.name_any()),
        ),
        other => ReconcilerError::Kube(other),
    }
}

/// Whether the cleanup finalizer is present on `resource`
pub fn has_finalizer<K: KeycloakResource>(resource: &K) -> bool {
    resource.finalizers().iter().any(|f| f == FINALIZER)
}

/// Persist `status` as the status subresource of `resource`
///
/// # Errors
///
/// Returns `StatusConflict` when the resource changed since it was read.
pub async fn persist_status<K: KeycloakResource>(
    client: &Client,
    resource: &K,
    status: &KeycloakStatus,
) -> Result<(), ReconcilerError> {
    let changed = resource
        .keycloak_status()
        .is_none_or(|previous| status.differs_from(previous));

    let patch = json!({
        "metadata": { "resourceVersion": resource.resource_version() },
        "status": status,
    });
    api_for(client, resource)
        .patch_status(
            &resource.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| map_conflict(resource, e))?;

    debug!(
        kind = K::KIND,
        name = %resource.name_any(),
        state = status.state.as_str(),
        changed,
        "Persisted status"
    );
    Ok(())
}

/// Add the cleanup finalizer if missing
///
/// Returns the patched object when the finalizer was added, so later
/// patches in the same reconciliation carry its new `resourceVersion`.
///
/// # Errors
///
/// Returns `StatusConflict` when the resource changed since it was read.
pub async fn ensure_finalizer<K: KeycloakResource>(
    client: &Client,
    resource: &K,
) -> Result<Option<K>, ReconcilerError> {
    if has_finalizer(resource) {
        return Ok(None);
    }

    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    let patch = json!({
        "metadata": {
            "resourceVersion": resource.resource_version(),
            "finalizers": finalizers,
        }
    });
    let patched = api_for(client, resource)
        .patch(
            &resource.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| map_conflict(resource, e))?;

    debug!(kind = K::KIND, name = %resource.name_any(), "Added finalizer");
    Ok(Some(patched))
}

/// Remove the cleanup finalizer, letting Kubernetes delete the resource
///
/// # Errors
///
/// Returns `StatusConflict` when the resource changed since it was read.
pub async fn remove_finalizer<K: KeycloakResource>(
    client: &Client,
    resource: &K,
) -> Result<(), ReconcilerError> {
    if !has_finalizer(resource) {
        return Ok(());
    }

    let finalizers: Vec<&String> = resource
        .finalizers()
        .iter()
        .filter(|f| *f != FINALIZER)
        .collect();
    let patch = json!({
        "metadata": {
            "resourceVersion": resource.resource_version(),
            "finalizers": finalizers,
        }
    });
    match api_for(client, resource)
        .patch(
            &resource.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
    {
        Ok(_) => {
            debug!(kind = K::KIND, name = %resource.name_any(), "Removed finalizer");
            Ok(())
        }
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
        Err(e) => Err(map_conflict(resource, e)),
    }
}
