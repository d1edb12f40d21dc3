//! # Connection Scope
//!
//! An open Keycloak session owned by exactly one reconciliation. The session
//! is released when the scope is dropped, on every exit path of the
//! reconciliation including early returns, errors and timeouts.

use crate::controller::connection::ResolvedConnection;
use crate::crd::ResourceKey;
use crate::keycloak::{KeycloakBackend, KeycloakError, KeycloakSession};
use crate::observability::metrics;
use std::ops::Deref;
use tracing::debug;

pub struct ConnectionScope {
    session: Box<dyn KeycloakSession>,
    resource: ResourceKey,
}

impl std::fmt::Debug for ConnectionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionScope")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl ConnectionScope {
    /// Authenticate against Keycloak on behalf of `resource`
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the session cannot be opened.
    pub async fn open(
        backend: &dyn KeycloakBackend,
        connection: &ResolvedConnection,
        resource: &ResourceKey,
    ) -> Result<Self, KeycloakError> {
        let session = backend.connect(connection).await?;
        metrics::increment_active_connection_scopes();
        debug!(resource = %resource, url = %connection.url, "Opened connection scope");
        Ok(Self {
            session,
            resource: resource.clone(),
        })
    }
}

impl Deref for ConnectionScope {
    type Target = dyn KeycloakSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        self.session.release();
        metrics::decrement_active_connection_scopes();
        debug!(resource = %self.resource, "Released connection scope");
    }
}
