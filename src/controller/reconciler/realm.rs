//! # Realm Reconciliation
//!
//! Imports a `Realm` into Keycloak. The realm is looked up by its recorded
//! `externalId` once one exists, so renaming `spec.realm.realm` after the
//! first import renames that realm; the new name becomes the `externalId`.

use crate::controller::connection::resolve_connection;
use crate::controller::reconciler::{
    primary_key, with_timeout, Cleanup, KeycloakResource, Reconciler, ReconcilerError,
};
use crate::controller::scope::ConnectionScope;
use crate::crd::{KeycloakStatus, Realm, ResourceKey};
use crate::keycloak::Attributes;
use crate::observability::metrics;
use async_trait::async_trait;
use tracing::{debug, info, warn};

impl Realm {
    async fn import(
        &self,
        key: &ResourceKey,
        reconciler: &Reconciler,
    ) -> Result<(String, Attributes), ReconcilerError> {
        let connection = resolve_connection(
            &reconciler.settings,
            self.spec.keycloak_connection.as_ref(),
            &key.namespace,
            reconciler.secrets.as_ref(),
        )
        .await?;
        let session = ConnectionScope::open(reconciler.backend.as_ref(), &connection, key).await?;

        let mut attributes = self
            .status
            .as_ref()
            .map(|s| s.attributes.clone())
            .unwrap_or_default();
        let external_id = session
            .import_realm(self.realm_id(), &self.spec.realm, &mut attributes)
            .await?;
        Ok((external_id, attributes))
    }

    async fn delete(
        &self,
        key: &ResourceKey,
        external_id: &str,
        reconciler: &Reconciler,
    ) -> Result<(), ReconcilerError> {
        let connection = resolve_connection(
            &reconciler.settings,
            self.spec.keycloak_connection.as_ref(),
            &key.namespace,
            reconciler.secrets.as_ref(),
        )
        .await?;
        let session = ConnectionScope::open(reconciler.backend.as_ref(), &connection, key).await?;
        session.delete_realm(external_id).await?;
        Ok(())
    }
}

#[async_trait]
impl KeycloakResource for Realm {
    const KIND: &'static str = "Realm";

    fn keycloak_status(&self) -> Option<&KeycloakStatus> {
        self.status.as_ref()
    }

    async fn apply(&self, reconciler: &Reconciler) -> KeycloakStatus {
        let generation = self.metadata.generation;
        let result = match primary_key(self) {
            Ok(key) => {
                // Registered before anything can fail so a missing secret is already watched
                reconciler
                    .realm_secrets
                    .on_upsert(&key, self.secret_dependencies());
                with_timeout(
                    reconciler.config.reconcile_timeout(),
                    self.import(&key, reconciler),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((external_id, attributes)) => {
                info!(realm = %external_id, "Realm imported");
                KeycloakStatus::success(external_id, attributes, generation)
            }
            Err(error) => {
                warn!(realm = %self.realm_id(), error = %error, "Realm import failed");
                metrics::increment_reconciliation_errors(Self::KIND, error.metric_label());
                KeycloakStatus::failure(self.status.as_ref(), &error, generation)
            }
        }
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Cleanup {
        let Ok(key) = primary_key(self) else {
            return Cleanup::RemoveFinalizer;
        };
        reconciler.realm_secrets.on_delete(&key);

        let Some(external_id) = self
            .status
            .as_ref()
            .and_then(|s| s.external_id.as_deref())
        else {
            debug!(resource = %key, "Realm was never imported, nothing to delete");
            return Cleanup::RemoveFinalizer;
        };

        match with_timeout(
            reconciler.config.reconcile_timeout(),
            self.delete(&key, external_id, reconciler),
        )
        .await
        {
            Ok(()) => {
                info!(realm = %external_id, "Realm deleted");
                Cleanup::RemoveFinalizer
            }
            Err(error) => {
                warn!(realm = %external_id, error = %error, "Realm deletion failed, keeping finalizer");
                Cleanup::KeepFinalizer(KeycloakStatus::failure(
                    self.status.as_ref(),
                    &error,
                    self.metadata.generation,
                ))
            }
        }
    }
}
