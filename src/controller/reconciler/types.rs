//! # Types
//!
//! Core types for the reconcilers: the error taxonomy, the shared reconciler
//! context, and per-resource backoff bookkeeping.

use crate::config::{ControllerConfig, KeycloakSettings};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::dependency_index::DependencyIndex;
use crate::controller::store::{RealmStore, SecretStore};
use crate::crd::KeycloakStatus;
use crate::keycloak::{KeycloakBackend, KeycloakError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while reconciling a resource
///
/// The `Display` text of the user-facing variants is written verbatim into
/// `status.message`.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("The linked credential secret '{name}' in namespace '{namespace}' does not exist.")]
    SecretNotFound { name: String, namespace: String },

    #[error(
        "The linked credential secret '{name}' in namespace '{namespace}' does not contain key '{key}'."
    )]
    SecretKeyMissing {
        name: String,
        namespace: String,
        key: String,
    },

    #[error(
        "The linked credential secret '{name}' in namespace '{namespace}' holds a value under key '{key}' that is not valid UTF-8."
    )]
    SecretNotUtf8 {
        name: String,
        namespace: String,
        key: String,
    },

    #[error("Realm named {name} does not exist in namespace {namespace}.")]
    RealmNotFound { name: String, namespace: String },

    #[error("{}", .0.status_message())]
    ExternalService(#[from] KeycloakError),

    #[error("Reconciliation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Status of {0} was modified concurrently")]
    StatusConflict(String),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcilerError {
    /// Short label for metrics
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReconcilerError::SecretNotFound { .. } => "secret_not_found",
            ReconcilerError::SecretKeyMissing { .. } => "secret_key_missing",
            ReconcilerError::SecretNotUtf8 { .. } => "secret_not_utf8",
            ReconcilerError::RealmNotFound { .. } => "realm_not_found",
            ReconcilerError::ExternalService(_) => "external_service",
            ReconcilerError::Timeout(_) => "timeout",
            ReconcilerError::StatusConflict(_) => "status_conflict",
            ReconcilerError::InvalidResource(_) => "invalid_resource",
            ReconcilerError::Kube(_) => "kubernetes",
        }
    }

    /// Errors the runtime retries immediately instead of backing off
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::StatusConflict(_))
    }
}

/// Result of a cleanup attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// External entity is gone (or never existed); the finalizer may be removed
    RemoveFinalizer,
    /// Deletion failed; keep the finalizer and record the failure in status
    KeepFinalizer(KeycloakStatus),
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            backoff: FibonacciBackoff::new(config.backoff_min_secs, config.backoff_max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared context of the Realm and Client reconcilers
pub struct Reconciler {
    pub secrets: Arc<dyn SecretStore>,
    pub realms: Arc<dyn RealmStore>,
    pub backend: Arc<dyn KeycloakBackend>,
    pub settings: Arc<KeycloakSettings>,
    pub config: ControllerConfig,
    /// Secret -> Realm dependencies (connection credentials)
    pub realm_secrets: DependencyIndex,
    /// Secret -> Client dependencies (client secrets)
    pub client_secrets: DependencyIndex,
    /// Realm -> Client dependencies
    pub client_realms: DependencyIndex,
    // Backoff state per resource (identified by kind/namespace/name)
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .field("config", &self.config)
            .field("realm_secrets", &self.realm_secrets)
            .field("client_secrets", &self.client_secrets)
            .field("client_realms", &self.client_realms)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        realms: Arc<dyn RealmStore>,
        backend: Arc<dyn KeycloakBackend>,
        settings: KeycloakSettings,
        config: ControllerConfig,
    ) -> Self {
        Self {
            secrets,
            realms,
            backend,
            settings: Arc::new(settings),
            config,
            realm_secrets: DependencyIndex::new("realm-secrets"),
            client_secrets: DependencyIndex::new("client-secrets"),
            client_realms: DependencyIndex::new("client-realms"),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Advance the backoff of `resource_key` and return the delay to wait
    pub fn next_backoff(&self, resource_key: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = states
            .entry(resource_key.to_string())
            .or_insert_with(|| BackoffState::new(&self.config));
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the backoff of `resource_key`; returns whether it had failed before
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states
            .remove(resource_key)
            .is_some_and(|state| state.error_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_errors_render_user_facing_messages() {
        let missing = ReconcilerError::SecretNotFound {
            name: "kc-admin".to_string(),
            namespace: "identity".to_string(),
        };
        assert_eq!(
            missing.to_string(),
            "The linked credential secret 'kc-admin' in namespace 'identity' does not exist."
        );

        let no_key = ReconcilerError::SecretKeyMissing {
            name: "kc-admin".to_string(),
            namespace: "identity".to_string(),
            key: "password".to_string(),
        };
        assert!(no_key
            .to_string()
            .ends_with("does not contain key 'password'."));
    }

    #[test]
    fn test_external_service_error_includes_body() {
        let error = ReconcilerError::from(KeycloakError::http(
            400,
            "Bad Request",
            Some("invalid realm".to_string()),
        ));
        assert_eq!(error.to_string(), "HTTP 400 Bad Request: invalid realm");
        assert_eq!(error.metric_label(), "external_service");
    }

    #[test]
    fn test_timeout_and_conflict_classification() {
        let timeout = ReconcilerError::Timeout(Duration::from_secs(60));
        assert_eq!(timeout.to_string(), "Reconciliation timed out after 60s");
        assert!(!timeout.is_conflict());
        assert!(ReconcilerError::StatusConflict("identity/acme".to_string()).is_conflict());
    }
}
