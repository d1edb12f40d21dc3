//! # Secret Resolution
//!
//! Turns a [`SecretRef`] into the plaintext credential it designates.
//! Nothing is cached: a rotated Secret is picked up by the next reconciliation.

use crate::controller::reconciler::ReconcilerError;
use crate::controller::store::SecretStore;
use crate::crd::SecretRef;
use tracing::debug;
use zeroize::Zeroizing;

/// Resolve `reference`, defaulting its namespace to `default_namespace`
pub async fn resolve_secret(
    store: &dyn SecretStore,
    reference: &SecretRef,
    default_namespace: &str,
) -> Result<Zeroizing<String>, ReconcilerError> {
    let (name, namespace, key) = match reference {
        SecretRef::Immediate { immediate_value } => {
            return Ok(Zeroizing::new(immediate_value.clone()));
        }
        SecretRef::External {
            name,
            namespace,
            key,
        } => (name, namespace.as_deref().unwrap_or(default_namespace), key),
    };

    let data = store
        .get(namespace, name)
        .await?
        .ok_or_else(|| ReconcilerError::SecretNotFound {
            name: name.clone(),
            namespace: namespace.to_string(),
        })?;

    let value = data
        .get(key)
        .ok_or_else(|| ReconcilerError::SecretKeyMissing {
            name: name.clone(),
            namespace: namespace.to_string(),
            key: key.clone(),
        })?;

    let plaintext = std::str::from_utf8(value).map_err(|e| {
        debug!(secret = %name, namespace = %namespace, key = %key, error = %e, "Credential is not UTF-8");
        ReconcilerError::SecretNotUtf8 {
            name: name.clone(),
            namespace: namespace.to_string(),
            key: key.clone(),
        }
    })?;

    debug!(secret = %name, namespace = %namespace, key = %key, "Read credential from secret");
    Ok(Zeroizing::new(plaintext.to_string()))
}
