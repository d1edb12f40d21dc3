//! Keycloak Admin REST Client
//!
//! HTTP implementation of [`KeycloakBackend`] over the Keycloak admin API.
//! Uses reqwest (rustls) for requests and the OpenID Connect token endpoint
//! of the login realm for authentication.
//!
//! Realm imports are checksummed: the SHA-256 of the desired representation
//! is kept in the status attributes and an unchanged checksum skips the
//! update call.

use super::{Attributes, KeycloakBackend, KeycloakError, KeycloakSession};
use crate::constants::REALM_CHECKSUM_ATTRIBUTE;
use crate::controller::connection::ResolvedConnection;
use crate::crd::{ClientRepresentation, RealmRepresentation};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::{header::LOCATION, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Opens admin sessions over HTTP
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpKeycloakBackend;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Form body of the token request
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

/// Subset of the client representation returned by client searches
#[derive(Debug, Deserialize)]
struct ClientSummary {
    id: String,
}

#[async_trait]
impl KeycloakBackend for HttpKeycloakBackend {
    async fn connect(
        &self,
        connection: &ResolvedConnection,
    ) -> Result<Box<dyn KeycloakSession>, KeycloakError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(connection.connect_timeout)
            .timeout(connection.read_timeout)
            .danger_accept_invalid_certs(!connection.ssl_verify);
        if let Some(proxy) = &connection.http_proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| KeycloakError::new(format!("Invalid Keycloak HTTP proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| KeycloakError::new(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(&connection.url)
            .map_err(|e| KeycloakError::new(format!("Invalid Keycloak URL '{}': {e}", connection.url)))?;

        let access_token = fetch_token(&http, &base_url, connection).await?;
        debug!(url = %base_url, login_realm = %connection.login_realm, "keycloak.session.opened");

        Ok(Box::new(AdminSession {
            http: Mutex::new(Some(http)),
            base_url,
            access_token,
        }))
    }
}

async fn fetch_token(
    http: &reqwest::Client,
    base_url: &Url,
    connection: &ResolvedConnection,
) -> Result<String, KeycloakError> {
    let request = match connection.grant_type.as_str() {
        "password" => TokenRequest {
            grant_type: "password",
            client_id: &connection.client_id,
            client_secret: connection.client_secret.as_deref().map(String::as_str),
            username: Some(connection.user.as_deref().ok_or_else(|| {
                KeycloakError::new("Keycloak user is required for the password grant")
            })?),
            password: Some(connection.password.as_deref().map(String::as_str).ok_or_else(
                || KeycloakError::new("Keycloak password is required for the password grant"),
            )?),
        },
        "client_credentials" => TokenRequest {
            grant_type: "client_credentials",
            client_id: &connection.client_id,
            client_secret: Some(
                connection
                    .client_secret
                    .as_deref()
                    .map(String::as_str)
                    .ok_or_else(|| {
                        KeycloakError::new(
                            "Keycloak client secret is required for the client_credentials grant",
                        )
                    })?,
            ),
            username: None,
            password: None,
        },
        other => {
            return Err(KeycloakError::new(format!(
                "Unsupported grant type '{other}'"
            )))
        }
    };

    let url = endpoint(
        base_url,
        &["realms", &connection.login_realm, "protocol", "openid-connect", "token"],
    )?;
    let response = http
        .post(url)
        .form(&request)
        .send()
        .await
        .map_err(transport_error)?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| KeycloakError::new(format!("Failed to parse token response: {e}")))?;
    Ok(token.access_token)
}

/// Build `base/segments...`, percent-encoding every segment
fn endpoint(base_url: &Url, segments: &[&str]) -> Result<Url, KeycloakError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| KeycloakError::new(format!("Keycloak URL '{base_url}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn transport_error(error: reqwest::Error) -> KeycloakError {
    if error.is_timeout() {
        KeycloakError::new(format!("Keycloak request timed out: {error}"))
    } else {
        KeycloakError::new(format!("Keycloak request failed: {error}"))
    }
}

async fn error_from_response(response: reqwest::Response) -> KeycloakError {
    let status = response.status();
    let body = response.text().await.ok();
    KeycloakError::http(
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
        body,
    )
}

/// Hex SHA-256 of the JSON form of a realm representation
fn realm_checksum(realm: &RealmRepresentation) -> Result<String, KeycloakError> {
    let bytes = serde_json::to_vec(realm)
        .map_err(|e| KeycloakError::new(format!("Failed to serialize realm: {e}")))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Last path segment of a `Location` header
fn id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// One authenticated admin session
struct AdminSession {
    http: Mutex<Option<reqwest::Client>>,
    base_url: Url,
    access_token: String,
}

impl AdminSession {
    fn client(&self) -> Result<reqwest::Client, KeycloakError> {
        self.http
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| KeycloakError::new("Keycloak session already released"))
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, KeycloakError> {
        let url = endpoint(&self.base_url, segments)?;
        let mut request = self
            .client()?
            .request(method, url)
            .bearer_auth(&self.access_token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(transport_error)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, KeycloakError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn find_client(
        &self,
        realm_id: &str,
        client_id: &str,
    ) -> Result<Option<String>, KeycloakError> {
        let response = self
            .send::<()>(
                Method::GET,
                &["admin", "realms", realm_id, "clients"],
                &[("clientId", client_id)],
                None,
            )
            .await?;
        let clients: Vec<ClientSummary> = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| KeycloakError::new(format!("Failed to parse client search: {e}")))?;
        Ok(clients.into_iter().next().map(|c| c.id))
    }

    async fn update_client(
        &self,
        realm_id: &str,
        id: &str,
        client: &ClientRepresentation,
    ) -> Result<bool, KeycloakError> {
        let mut body = client.clone();
        body.id = Some(id.to_string());
        let response = self
            .send(
                Method::PUT,
                &["admin", "realms", realm_id, "clients", id],
                &[],
                Some(&body),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await?;
        Ok(true)
    }
}

#[async_trait]
impl KeycloakSession for AdminSession {
    async fn import_realm(
        &self,
        realm_id: &str,
        realm: &RealmRepresentation,
        attributes: &mut Attributes,
    ) -> Result<String, KeycloakError> {
        let span = tracing::debug_span!("keycloak.realm.import", realm.id = realm_id);
        async move {
            let start = Instant::now();
            let checksum = realm_checksum(realm)?;

            let existing = self
                .send::<()>(Method::GET, &["admin", "realms", realm_id], &[], None)
                .await?;

            if existing.status() == StatusCode::NOT_FOUND {
                let response = self
                    .send(Method::POST, &["admin", "realms"], &[], Some(realm))
                    .await?;
                Self::expect_success(response).await?;
                info!(realm = %realm.realm, "Created realm");
            } else {
                Self::expect_success(existing).await?;
                let unchanged = attributes
                    .get(REALM_CHECKSUM_ATTRIBUTE)
                    .and_then(|values| values.first())
                    .is_some_and(|previous| *previous == checksum);
                if unchanged {
                    debug!(realm = %realm_id, "Realm unchanged, skipping update");
                } else {
                    let response = self
                        .send(Method::PUT, &["admin", "realms", realm_id], &[], Some(realm))
                        .await?;
                    Self::expect_success(response).await?;
                    info!(realm = %realm_id, "Updated realm");
                }
            }

            attributes.insert(REALM_CHECKSUM_ATTRIBUTE.to_string(), vec![checksum]);
            metrics::observe_keycloak_operation("import_realm", start.elapsed().as_secs_f64());
            Ok::<_, KeycloakError>(realm.realm.clone())
        }
        .instrument(span)
        .await
        .inspect_err(|_| metrics::increment_keycloak_operation_errors("import_realm"))
    }

    async fn delete_realm(&self, realm_id: &str) -> Result<(), KeycloakError> {
        let start = Instant::now();
        let response = self
            .send::<()>(Method::DELETE, &["admin", "realms", realm_id], &[], None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(realm = %realm_id, "Realm already absent");
        } else {
            Self::expect_success(response)
                .await
                .inspect_err(|_| metrics::increment_keycloak_operation_errors("delete_realm"))?;
            info!(realm = %realm_id, "Deleted realm");
        }
        metrics::observe_keycloak_operation("delete_realm", start.elapsed().as_secs_f64());
        Ok(())
    }

    async fn import_client(
        &self,
        realm_id: &str,
        client: &ClientRepresentation,
        _attributes: &mut Attributes,
    ) -> Result<String, KeycloakError> {
        let span = tracing::debug_span!(
            "keycloak.client.import",
            realm.id = realm_id,
            client.client_id = %client.client_id
        );
        async move {
            let start = Instant::now();

            if let Some(id) = client.id.as_deref() {
                if self.update_client(realm_id, id, client).await? {
                    debug!(client = %client.client_id, id, "Updated client");
                    metrics::observe_keycloak_operation("import_client", start.elapsed().as_secs_f64());
                    return Ok(id.to_string());
                }
                info!(client = %client.client_id, id, "Known client id vanished, looking up by clientId");
            }

            if let Some(id) = self.find_client(realm_id, &client.client_id).await? {
                if self.update_client(realm_id, &id, client).await? {
                    debug!(client = %client.client_id, id, "Updated client");
                    metrics::observe_keycloak_operation("import_client", start.elapsed().as_secs_f64());
                    return Ok(id);
                }
            }

            let mut body = client.clone();
            body.id = None;
            let response = self
                .send(Method::POST, &["admin", "realms", realm_id, "clients"], &[], Some(&body))
                .await?;
            let response = Self::expect_success(response).await?;
            let location_id = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(id_from_location);
            let id = match location_id {
                Some(id) => id,
                None => self
                    .find_client(realm_id, &client.client_id)
                    .await?
                    .ok_or_else(|| {
                        KeycloakError::new(format!(
                            "Client '{}' was created but cannot be found in realm '{realm_id}'",
                            client.client_id
                        ))
                    })?,
            };
            info!(client = %client.client_id, id, "Created client");
            metrics::observe_keycloak_operation("import_client", start.elapsed().as_secs_f64());
            Ok::<_, KeycloakError>(id)
        }
        .instrument(span)
        .await
        .inspect_err(|_| metrics::increment_keycloak_operation_errors("import_client"))
    }

    async fn delete_client(&self, realm_id: &str, client_id: &str) -> Result<(), KeycloakError> {
        let start = Instant::now();
        let response = self
            .send::<()>(
                Method::DELETE,
                &["admin", "realms", realm_id, "clients", client_id],
                &[],
                None,
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(realm = %realm_id, client = %client_id, "Client already absent");
        } else {
            Self::expect_success(response)
                .await
                .inspect_err(|_| metrics::increment_keycloak_operation_errors("delete_client"))?;
            info!(realm = %realm_id, client = %client_id, "Deleted client");
        }
        metrics::observe_keycloak_operation("delete_client", start.elapsed().as_secs_f64());
        Ok(())
    }

    fn release(&self) {
        let released = self
            .http
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!(url = %self.base_url, "keycloak.session.released");
        }
    }
}
