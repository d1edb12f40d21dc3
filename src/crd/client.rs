//! # Client
//!
//! A Keycloak client declared as a Kubernetes resource, bound to a Realm
//! resource through `realmRef`. The generated type is re-exported as
//! `KeycloakClient` so it does not clash with `kube::Client`.

use crate::crd::{preserve_unknown_fields, KeycloakStatus, ResourceKey, SecretRef};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use zeroize::Zeroizing;

/// Client Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: keycloak.operator.io/v1alpha1
/// kind: Client
/// metadata:
///   name: storefront
///   namespace: shop
/// spec:
///   realmRef:
///     name: acme
///     namespace: identity
///   client:
///     clientId: storefront
///     publicClient: false
///   clientSecretRef:
///     name: storefront-oidc
///     key: client-secret
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "keycloak.operator.io",
    version = "v1alpha1",
    kind = "Client",
    namespaced,
    status = "KeycloakStatus",
    shortname = "kcclient",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"External ID", "type":"string", "jsonPath":".status.externalId"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClientSpec {
    /// Realm resource the client belongs to
    pub realm_ref: RealmRef,
    /// Client representation as accepted by the Keycloak admin API
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub client: ClientRepresentation,
    /// Secret of a confidential client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_ref: Option<SecretRef>,
}

/// Reference to a Realm resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct RealmRef {
    pub name: String,
    /// Defaults to the namespace of the Client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl RealmRef {
    #[must_use]
    pub fn key(&self, default_namespace: &str) -> ResourceKey {
        ResourceKey::new(
            self.namespace.as_deref().unwrap_or(default_namespace),
            self.name.as_str(),
        )
    }
}

/// Free-form client representation; `clientId`, `id` and `secret` are interpreted
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    pub client_id: String,
    /// Keycloak's internal id; filled from status, never from the spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Zeroed on drop, redacted in `Debug`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<Zeroizing<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for ClientRepresentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRepresentation")
            .field("client_id", &self.client_id)
            .field("id", &self.id)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("extra", &self.extra)
            .finish()
    }
}

impl Client {
    /// Realm resource this client points at
    #[must_use]
    pub fn realm_key(&self) -> Option<ResourceKey> {
        self.metadata
            .namespace
            .as_deref()
            .map(|namespace| self.spec.realm_ref.key(namespace))
    }

    /// Secrets this client reads, with the default namespace applied
    #[must_use]
    pub fn secret_dependencies(&self) -> BTreeSet<ResourceKey> {
        match (&self.spec.client_secret_ref, &self.metadata.namespace) {
            (Some(reference), Some(namespace)) => {
                reference.secret_key(namespace).into_iter().collect()
            }
            _ => BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(namespace: &str, realm_ref: RealmRef) -> Client {
        let mut client = Client::new(
            "storefront",
            ClientSpec {
                realm_ref,
                client: ClientRepresentation {
                    client_id: "storefront".to_string(),
                    ..ClientRepresentation::default()
                },
                client_secret_ref: Some(SecretRef::external("storefront-oidc", None, "secret")),
            },
        );
        client.metadata.namespace = Some(namespace.to_string());
        client
    }

    #[test]
    fn test_realm_key_defaults_to_client_namespace() {
        let local = client(
            "shop",
            RealmRef {
                name: "acme".to_string(),
                namespace: None,
            },
        );
        assert_eq!(local.realm_key(), Some(ResourceKey::new("shop", "acme")));

        let remote = client(
            "shop",
            RealmRef {
                name: "acme".to_string(),
                namespace: Some("identity".to_string()),
            },
        );
        assert_eq!(remote.realm_key(), Some(ResourceKey::new("identity", "acme")));
    }

    #[test]
    fn test_secret_dependencies_use_client_namespace() {
        let local = client(
            "shop",
            RealmRef {
                name: "acme".to_string(),
                namespace: Some("identity".to_string()),
            },
        );
        assert!(local
            .secret_dependencies()
            .contains(&ResourceKey::new("shop", "storefront-oidc")));
    }

    #[test]
    fn test_representation_round_trips_extra_fields() {
        let representation: ClientRepresentation = serde_json::from_value(serde_json::json!({
            "clientId": "storefront",
            "redirectUris": ["https://shop.example.com/*"]
        }))
        .unwrap();
        assert_eq!(representation.client_id, "storefront");
        assert!(representation.id.is_none());
        assert!(representation.extra.contains_key("redirectUris"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let representation: ClientRepresentation = serde_json::from_value(serde_json::json!({
            "clientId": "storefront",
            "secret": "s3cr3t"
        }))
        .unwrap();
        let rendered = format!("{representation:?}");
        assert!(rendered.contains("storefront"));
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("s3cr3t"));

        // Serialization still carries the secret to Keycloak
        let body = serde_json::to_value(&representation).unwrap();
        assert_eq!(body["secret"], "s3cr3t");
    }
}
