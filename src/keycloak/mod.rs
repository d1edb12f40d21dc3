//! # Keycloak
//!
//! Seam between the reconcilers and the Keycloak admin API.
//!
//! Reconcilers only see [`KeycloakBackend`] and [`KeycloakSession`]: a backend
//! opens one session per reconciliation from a resolved connection, and the
//! session performs the imports and deletes. [`admin`] holds the HTTP
//! implementation used by the operator binary.

pub mod admin;

use crate::controller::connection::ResolvedConnection;
use crate::crd::{ClientRepresentation, RealmRepresentation};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use admin::HttpKeycloakBackend;

/// Attribute map persisted in status on behalf of the session
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Failure reported by Keycloak or by the transport in front of it
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct KeycloakError {
    /// Human-readable failure, e.g. `HTTP 409 Conflict`
    pub message: String,
    /// HTTP status code when the failure came from a response
    pub status: Option<u16>,
    /// Response body when the failure came from a response that had one
    pub body: Option<String>,
}

impl KeycloakError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Failure carried by an HTTP response
    pub fn http(status: u16, reason: &str, body: Option<String>) -> Self {
        Self {
            message: format!("HTTP {status} {reason}"),
            status: Some(status),
            body: body.filter(|b| !b.trim().is_empty()),
        }
    }

    /// Message written to status: the message, then the response body after ": "
    #[must_use]
    pub fn status_message(&self) -> String {
        match &self.body {
            Some(body) => format!("{}: {}", self.message, body),
            None => self.message.clone(),
        }
    }
}

/// Opens sessions against a Keycloak instance
#[async_trait]
pub trait KeycloakBackend: Send + Sync {
    /// Authenticate with `connection` and return a session owned by the caller
    async fn connect(
        &self,
        connection: &ResolvedConnection,
    ) -> Result<Box<dyn KeycloakSession>, KeycloakError>;
}

/// Authenticated session, exclusive to one reconciliation
#[async_trait]
pub trait KeycloakSession: Send + Sync {
    /// Create or update the realm known as `realm_id`; returns the realm's identity afterwards
    async fn import_realm(
        &self,
        realm_id: &str,
        realm: &RealmRepresentation,
        attributes: &mut Attributes,
    ) -> Result<String, KeycloakError>;

    async fn delete_realm(&self, realm_id: &str) -> Result<(), KeycloakError>;

    /// Create or update a client in `realm_id`; `client.id` carries the known identity, if any.
    /// Returns the client's internal id.
    async fn import_client(
        &self,
        realm_id: &str,
        client: &ClientRepresentation,
        attributes: &mut Attributes,
    ) -> Result<String, KeycloakError>;

    async fn delete_client(&self, realm_id: &str, client_id: &str) -> Result<(), KeycloakError>;

    /// Release pooled resources held by the session
    fn release(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_appends_body() {
        let error = KeycloakError::http(409, "Conflict", Some(r#"{"errorMessage":"Conflict detected"}"#.to_string()));
        assert_eq!(
            error.status_message(),
            r#"HTTP 409 Conflict: {"errorMessage":"Conflict detected"}"#
        );
    }

    #[test]
    fn test_status_message_without_body() {
        let error = KeycloakError::http(401, "Unauthorized", Some("  ".to_string()));
        assert_eq!(error.status_message(), "HTTP 401 Unauthorized");
        assert_eq!(KeycloakError::new("connection refused").status_message(), "connection refused");
    }
}
