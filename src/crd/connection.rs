//! # Keycloak Connection Overrides
//!
//! Optional per-Realm overrides of the global connection settings. Every
//! field that is set replaces the corresponding global value; unset fields
//! keep the global default.

use crate::crd::{ResourceKey, SecretRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakConnection {
    /// Base URL of the Keycloak server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Realm used to obtain admin tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_realm: Option<String>,
    /// OAuth client used to obtain admin tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Admin user for the `password` grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<SecretRef>,
    /// Client secret for the `client_credentials` grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_secret: Option<SecretRef>,
    /// OAuth grant type (`password` or `client_credentials`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    /// Verify the server certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_seconds: Option<u64>,
}

impl KeycloakConnection {
    /// Secrets these overrides read credentials from
    #[must_use]
    pub fn secret_dependencies(&self, default_namespace: &str) -> BTreeSet<ResourceKey> {
        [&self.password_secret, &self.client_secret_secret]
            .into_iter()
            .flatten()
            .filter_map(|reference| reference.secret_key(default_namespace))
            .collect()
    }
}
