//! # Realm
//!
//! A Keycloak realm declared as a Kubernetes resource.

use crate::crd::{preserve_unknown_fields, KeycloakConnection, KeycloakStatus, ResourceKey};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Realm Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: keycloak.operator.io/v1alpha1
/// kind: Realm
/// metadata:
///   name: acme
///   namespace: identity
/// spec:
///   realm:
///     realm: acme
///     enabled: true
///   keycloakConnection:
///     url: https://keycloak.identity.svc
///     user: admin
///     passwordSecret:
///       name: keycloak-admin
///       key: password
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "keycloak.operator.io",
    version = "v1alpha1",
    kind = "Realm",
    namespaced,
    status = "KeycloakStatus",
    shortname = "kcrealm",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"External ID", "type":"string", "jsonPath":".status.externalId"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RealmSpec {
    /// Realm representation as accepted by the Keycloak admin API
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub realm: RealmRepresentation,
    /// Overrides of the operator-wide connection settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keycloak_connection: Option<KeycloakConnection>,
}

/// Free-form realm representation; only the realm name is interpreted
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RealmRepresentation {
    /// Nominal realm name
    pub realm: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Realm {
    /// Identity of the realm in Keycloak: the recorded external id, else the nominal name
    #[must_use]
    pub fn realm_id(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.external_id.as_deref())
            .unwrap_or(&self.spec.realm.realm)
    }

    /// Secrets referenced by the connection overrides, with the default namespace applied
    #[must_use]
    pub fn secret_dependencies(&self) -> BTreeSet<ResourceKey> {
        match (&self.spec.keycloak_connection, &self.metadata.namespace) {
            (Some(connection), Some(namespace)) => connection.secret_dependencies(namespace),
            _ => BTreeSet::new(),
        }
    }
}
