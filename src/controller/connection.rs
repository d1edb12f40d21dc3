//! # Connection Resolution
//!
//! Builds the connection a single reconciliation talks to Keycloak with:
//! the global [`KeycloakSettings`] with the resource's `keycloakConnection`
//! overrides laid over them field by field, and credentials read from the
//! referenced Secrets.
//!
//! Every call produces a fresh value owned by the caller. Nothing here is
//! shared between reconciliations.

use crate::config::KeycloakSettings;
use crate::controller::reconciler::ReconcilerError;
use crate::controller::secrets::resolve_secret;
use crate::controller::store::SecretStore;
use crate::crd::KeycloakConnection;
use std::ops::Deref;
use std::time::Duration;

/// Connection settings of one reconciliation, credentials resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection(KeycloakSettings);

impl ResolvedConnection {
    /// Use `settings` unchanged, e.g. in tests
    #[must_use]
    pub fn new(settings: KeycloakSettings) -> Self {
        Self(settings)
    }
}

impl Deref for ResolvedConnection {
    type Target = KeycloakSettings;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Lay the plain (non-secret) override fields over `global`
#[must_use]
pub fn apply_overrides(
    global: &KeycloakSettings,
    overrides: Option<&KeycloakConnection>,
) -> KeycloakSettings {
    let mut merged = global.clone();
    let Some(overrides) = overrides else {
        return merged;
    };

    if let Some(url) = &overrides.url {
        merged.url.clone_from(url);
    }
    if let Some(login_realm) = &overrides.login_realm {
        merged.login_realm.clone_from(login_realm);
    }
    if let Some(client_id) = &overrides.client_id {
        merged.client_id.clone_from(client_id);
    }
    if let Some(user) = &overrides.user {
        merged.user = Some(user.clone());
    }
    if let Some(grant_type) = &overrides.grant_type {
        merged.grant_type.clone_from(grant_type);
    }
    if let Some(ssl_verify) = overrides.ssl_verify {
        merged.ssl_verify = ssl_verify;
    }
    if let Some(secs) = overrides.connect_timeout_seconds {
        merged.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = overrides.read_timeout_seconds {
        merged.read_timeout = Duration::from_secs(secs);
    }
    merged
}

/// Build the connection for a resource living in `namespace`
///
/// # Errors
///
/// Fails when a referenced credential Secret or key does not exist.
pub async fn resolve_connection(
    global: &KeycloakSettings,
    overrides: Option<&KeycloakConnection>,
    namespace: &str,
    secrets: &dyn SecretStore,
) -> Result<ResolvedConnection, ReconcilerError> {
    let mut merged = apply_overrides(global, overrides);

    if let Some(overrides) = overrides {
        if let Some(reference) = &overrides.password_secret {
            merged.password = Some(resolve_secret(secrets, reference, namespace).await?);
        }
        if let Some(reference) = &overrides.client_secret_secret {
            merged.client_secret = Some(resolve_secret(secrets, reference, namespace).await?);
        }
    }

    Ok(ResolvedConnection(merged))
}
