//! # Keycloak Settings
//!
//! Global connection defaults for the Keycloak admin API. Every resource
//! starts from these values; `keycloakConnection` overrides on a Realm are
//! merged on top per reconciliation (see [`crate::controller::connection`]).

use crate::config::{
    env_var_or_default, env_var_or_default_bool, env_var_or_default_opt, env_var_or_default_str,
};
use std::time::Duration;
use zeroize::Zeroizing;

/// Process-wide Keycloak connection defaults
#[derive(Clone, PartialEq, Eq)]
pub struct KeycloakSettings {
    /// Base URL of the Keycloak server
    pub url: String,
    /// Realm used to obtain admin tokens
    pub login_realm: String,
    /// OAuth client used to obtain admin tokens
    pub client_id: String,
    /// Admin user for the `password` grant
    pub user: Option<String>,
    /// Admin password for the `password` grant
    pub password: Option<Zeroizing<String>>,
    /// Client secret for the `client_credentials` grant
    pub client_secret: Option<Zeroizing<String>>,
    /// OAuth grant type (`password` or `client_credentials`)
    pub grant_type: String,
    /// Verify the server certificate
    pub ssl_verify: bool,
    /// Optional HTTP proxy for admin API calls
    pub http_proxy: Option<String>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Per-request timeout
    pub read_timeout: Duration,
}

impl std::fmt::Debug for KeycloakSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakSettings")
            .field("url", &self.url)
            .field("login_realm", &self.login_realm)
            .field("client_id", &self.client_id)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("grant_type", &self.grant_type)
            .field("ssl_verify", &self.ssl_verify)
            .field("http_proxy", &self.http_proxy)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl Default for KeycloakSettings {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            url: DEFAULT_KEYCLOAK_URL.to_string(),
            login_realm: DEFAULT_LOGIN_REALM.to_string(),
            client_id: DEFAULT_ADMIN_CLIENT_ID.to_string(),
            user: None,
            password: None,
            client_secret: None,
            grant_type: DEFAULT_GRANT_TYPE.to_string(),
            ssl_verify: true,
            http_proxy: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

impl KeycloakSettings {
    /// Load the global connection defaults from `KEYCLOAK_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            url: env_var_or_default_str("KEYCLOAK_URL", DEFAULT_KEYCLOAK_URL),
            login_realm: env_var_or_default_str("KEYCLOAK_LOGIN_REALM", DEFAULT_LOGIN_REALM),
            client_id: env_var_or_default_str("KEYCLOAK_CLIENT_ID", DEFAULT_ADMIN_CLIENT_ID),
            user: env_var_or_default_opt("KEYCLOAK_USER"),
            password: env_var_or_default_opt("KEYCLOAK_PASSWORD").map(Zeroizing::new),
            client_secret: env_var_or_default_opt("KEYCLOAK_CLIENT_SECRET").map(Zeroizing::new),
            grant_type: env_var_or_default_str("KEYCLOAK_GRANT_TYPE", DEFAULT_GRANT_TYPE),
            ssl_verify: env_var_or_default_bool("KEYCLOAK_SSL_VERIFY", true),
            http_proxy: env_var_or_default_opt("KEYCLOAK_HTTP_PROXY"),
            connect_timeout: Duration::from_secs(env_var_or_default(
                "KEYCLOAK_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            read_timeout: Duration::from_secs(env_var_or_default(
                "KEYCLOAK_READ_TIMEOUT_SECS",
                DEFAULT_READ_TIMEOUT_SECS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_credentials() {
        let settings = KeycloakSettings {
            user: Some("admin".to_string()),
            password: Some(Zeroizing::new("hunter2".to_string())),
            client_secret: Some(Zeroizing::new("s3cr3t".to_string())),
            ..KeycloakSettings::default()
        };

        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"), "password leaked: {rendered}");
        assert!(!rendered.contains("s3cr3t"), "client secret leaked: {rendered}");
        assert!(rendered.contains("admin"));
    }
}
