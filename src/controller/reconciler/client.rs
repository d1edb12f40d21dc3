//! # Client Reconciliation
//!
//! Imports a `Client` into the realm of the `Realm` resource it points at.
//! The connection comes from the Realm's overrides (resolved in the Realm's
//! namespace); `clientSecretRef` is resolved in the Client's namespace.

use crate::controller::connection::resolve_connection;
use crate::controller::reconciler::{
    primary_key, with_timeout, Cleanup, KeycloakResource, Reconciler, ReconcilerError,
};
use crate::controller::scope::ConnectionScope;
use crate::controller::secrets::resolve_secret;
use crate::crd::{KeycloakClient, KeycloakStatus, Realm, ResourceKey};
use crate::keycloak::Attributes;
use crate::observability::metrics;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

impl KeycloakClient {
    async fn load_realm(
        &self,
        key: &ResourceKey,
        reconciler: &Reconciler,
    ) -> Result<(ResourceKey, Option<Realm>), ReconcilerError> {
        let realm_key = self.spec.realm_ref.key(&key.namespace);
        let realm = reconciler
            .realms
            .get(&realm_key.namespace, &realm_key.name)
            .await?;
        Ok((realm_key, realm))
    }

    async fn import(
        &self,
        key: &ResourceKey,
        reconciler: &Reconciler,
    ) -> Result<(String, Attributes), ReconcilerError> {
        let (realm_key, realm) = self.load_realm(key, reconciler).await?;
        let realm = realm.ok_or_else(|| ReconcilerError::RealmNotFound {
            name: realm_key.name.clone(),
            namespace: realm_key.namespace.clone(),
        })?;

        let connection = resolve_connection(
            &reconciler.settings,
            realm.spec.keycloak_connection.as_ref(),
            &realm_key.namespace,
            reconciler.secrets.as_ref(),
        )
        .await?;

        let mut desired = self.spec.client.clone();
        desired.id = self.status.as_ref().and_then(|s| s.external_id.clone());
        if let Some(reference) = &self.spec.client_secret_ref {
            let secret = resolve_secret(reconciler.secrets.as_ref(), reference, &key.namespace).await?;
            desired.secret = Some(secret);
        }

        let session = ConnectionScope::open(reconciler.backend.as_ref(), &connection, key).await?;
        let mut attributes = self
            .status
            .as_ref()
            .map(|s| s.attributes.clone())
            .unwrap_or_default();
        let external_id = session
            .import_client(realm.realm_id(), &desired, &mut attributes)
            .await?;
        Ok((external_id, attributes))
    }

    /// Returns `false` when the Realm resource is gone and nothing was deleted
    async fn delete(
        &self,
        key: &ResourceKey,
        external_id: &str,
        reconciler: &Reconciler,
    ) -> Result<bool, ReconcilerError> {
        let (realm_key, realm) = self.load_realm(key, reconciler).await?;
        let Some(realm) = realm else {
            debug!(resource = %key, realm = %realm_key, "Realm resource gone, client went with it");
            return Ok(false);
        };

        let connection = resolve_connection(
            &reconciler.settings,
            realm.spec.keycloak_connection.as_ref(),
            &realm_key.namespace,
            reconciler.secrets.as_ref(),
        )
        .await?;
        let session = ConnectionScope::open(reconciler.backend.as_ref(), &connection, key).await?;
        session.delete_client(realm.realm_id(), external_id).await?;
        Ok(true)
    }
}

#[async_trait]
impl KeycloakResource for KeycloakClient {
    const KIND: &'static str = "Client";

    fn keycloak_status(&self) -> Option<&KeycloakStatus> {
        self.status.as_ref()
    }

    async fn apply(&self, reconciler: &Reconciler) -> KeycloakStatus {
        let generation = self.metadata.generation;
        let result = match primary_key(self) {
            Ok(key) => {
                reconciler
                    .client_secrets
                    .on_upsert(&key, self.secret_dependencies());
                reconciler
                    .client_realms
                    .on_upsert(&key, self.realm_key().into_iter().collect::<BTreeSet<_>>());
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
                info!(client = %self.spec.client.client_id, id = %external_id, "Client imported");
                KeycloakStatus::success(external_id, attributes, generation)
            }
            Err(error) => {
                warn!(client = %self.spec.client.client_id, error = %error, "Client import failed");
                metrics::increment_reconciliation_errors(Self::KIND, error.metric_label());
                KeycloakStatus::failure(self.status.as_ref(), &error, generation)
            }
        }
    }

    async fn cleanup(&self, reconciler: &Reconciler) -> Cleanup {
        let Ok(key) = primary_key(self) else {
            return Cleanup::RemoveFinalizer;
        };
        reconciler.client_secrets.on_delete(&key);
        reconciler.client_realms.on_delete(&key);

        let Some(external_id) = self
            .status
            .as_ref()
            .and_then(|s| s.external_id.as_deref())
        else {
            debug!(resource = %key, "Client was never imported, nothing to delete");
            return Cleanup::RemoveFinalizer;
        };

        match with_timeout(
            reconciler.config.reconcile_timeout(),
            self.delete(&key, external_id, reconciler),
        )
        .await
        {
            Ok(deleted) => {
                if deleted {
                    info!(client = %self.spec.client.client_id, id = %external_id, "Client deleted");
                }
                Cleanup::RemoveFinalizer
            }
            Err(error) => {
                warn!(
                    client = %self.spec.client.client_id,
                    error = %error,
                    "Client deletion failed, keeping finalizer"
                );
                Cleanup::KeepFinalizer(KeycloakStatus::failure(
                    self.status.as_ref(),
                    &error,
                    self.metadata.generation,
                ))
            }
        }
    }
}
