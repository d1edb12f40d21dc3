//! Common test utilities
//!
//! In-memory stand-ins for the Kubernetes stores and the Keycloak backend, so
//! reconcilers can be driven end to end without a cluster or a Keycloak.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use keycloak_config_operator::config::{ControllerConfig, KeycloakSettings};
use keycloak_config_operator::controller::connection::ResolvedConnection;
use keycloak_config_operator::controller::reconciler::Reconciler;
use keycloak_config_operator::controller::store::{RealmStore, SecretData, SecretStore};
use keycloak_config_operator::crd::{
    ClientRepresentation, ClientSpec, KeycloakClient, KeycloakConnection, KeycloakStatus, Realm,
    RealmRef, RealmRepresentation, RealmSpec, SecretRef,
};
use keycloak_config_operator::keycloak::{
    Attributes, KeycloakBackend, KeycloakError, KeycloakSession,
};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Secrets keyed by `(namespace, name)`
#[derive(Default)]
pub struct MapSecretStore {
    secrets: Mutex<BTreeMap<(String, String), SecretData>>,
    pub reads: AtomicUsize,
}

impl MapSecretStore {
    pub fn insert(&self, namespace: &str, name: &str, key: &str, value: &str) {
        self.secrets
            .lock()
            .unwrap()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.as_bytes().to_vec());
    }
}

#[async_trait]
impl SecretStore for MapSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, kube::Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Realm resources keyed by `(namespace, name)`
#[derive(Default)]
pub struct MapRealmStore {
    realms: Mutex<BTreeMap<(String, String), Realm>>,
}

impl MapRealmStore {
    pub fn insert(&self, realm: Realm) {
        let key = (
            realm.metadata.namespace.clone().unwrap_or_default(),
            realm.metadata.name.clone().unwrap_or_default(),
        );
        self.realms.lock().unwrap().insert(key, realm);
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.realms
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }
}

#[async_trait]
impl RealmStore for MapRealmStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Realm>, kube::Error> {
        Ok(self
            .realms
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// What the fake Keycloak holds and how often it was asked to change
#[derive(Default)]
pub struct FakeKeycloak {
    pub realms: BTreeMap<String, RealmRepresentation>,
    /// Clients keyed by `(realm, id)`
    pub clients: BTreeMap<(String, String), ClientRepresentation>,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Ids an update was addressed to, in call order
    pub updated_ids: Vec<String>,
    /// Returned by every call while set
    pub failure: Option<KeycloakError>,
}

/// Backend handing out sessions over one shared [`FakeKeycloak`]
#[derive(Default)]
pub struct FakeBackend {
    pub keycloak: Arc<Mutex<FakeKeycloak>>,
    pub connects: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    pub connections: Mutex<Vec<KeycloakSettings>>,
}

impl FakeBackend {
    pub fn fail_with(&self, error: KeycloakError) {
        self.keycloak.lock().unwrap().failure = Some(error);
    }

    pub fn heal(&self) {
        self.keycloak.lock().unwrap().failure = None;
    }

    pub fn creates(&self) -> usize {
        self.keycloak.lock().unwrap().creates
    }

    pub fn updates(&self) -> usize {
        self.keycloak.lock().unwrap().updates
    }

    pub fn updated_ids(&self) -> Vec<String> {
        self.keycloak.lock().unwrap().updated_ids.clone()
    }

    pub fn deletes(&self) -> usize {
        self.keycloak.lock().unwrap().deletes
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn last_connection(&self) -> KeycloakSettings {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("backend was never connected")
    }
}

#[async_trait]
impl KeycloakBackend for FakeBackend {
    async fn connect(
        &self,
        connection: &ResolvedConnection,
    ) -> Result<Box<dyn KeycloakSession>, KeycloakError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connections
            .lock()
            .unwrap()
            .push(KeycloakSettings::clone(connection));
        Ok(Box::new(FakeSession {
            keycloak: Arc::clone(&self.keycloak),
            releases: Arc::clone(&self.releases),
        }))
    }
}

struct FakeSession {
    keycloak: Arc<Mutex<FakeKeycloak>>,
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl KeycloakSession for FakeSession {
    async fn import_realm(
        &self,
        realm_id: &str,
        realm: &RealmRepresentation,
        attributes: &mut Attributes,
    ) -> Result<String, KeycloakError> {
        let mut keycloak = self.keycloak.lock().unwrap();
        if let Some(error) = &keycloak.failure {
            return Err(error.clone());
        }
        attributes.insert("imported-as".to_string(), vec![realm_id.to_string()]);
        if keycloak.realms.remove(realm_id).is_some() {
            // An update may rename the realm; it is known by its new name afterwards
            keycloak.updates += 1;
            keycloak.updated_ids.push(realm_id.to_string());
            keycloak.realms.insert(realm.realm.clone(), realm.clone());
            Ok(realm.realm.clone())
        } else {
            keycloak.creates += 1;
            keycloak.realms.insert(realm.realm.clone(), realm.clone());
            Ok(realm.realm.clone())
        }
    }

    async fn delete_realm(&self, realm_id: &str) -> Result<(), KeycloakError> {
        let mut keycloak = self.keycloak.lock().unwrap();
        if let Some(error) = &keycloak.failure {
            return Err(error.clone());
        }
        keycloak.deletes += 1;
        keycloak.realms.remove(realm_id);
        keycloak.clients.retain(|(realm, _), _| realm != realm_id);
        Ok(())
    }

    async fn import_client(
        &self,
        realm_id: &str,
        client: &ClientRepresentation,
        _attributes: &mut Attributes,
    ) -> Result<String, KeycloakError> {
        let mut keycloak = self.keycloak.lock().unwrap();
        if let Some(error) = &keycloak.failure {
            return Err(error.clone());
        }
        if !keycloak.realms.contains_key(realm_id) {
            return Err(KeycloakError::http(
                404,
                "Not Found",
                Some(r#"{"error":"Realm not found."}"#.to_string()),
            ));
        }
        match &client.id {
            Some(id) if keycloak.clients.contains_key(&(realm_id.to_string(), id.clone())) => {
                keycloak.updates += 1;
                keycloak.updated_ids.push(id.clone());
                keycloak
                    .clients
                    .insert((realm_id.to_string(), id.clone()), client.clone());
                Ok(id.clone())
            }
            _ => {
                keycloak.creates += 1;
                let id = format!("{}-{}", client.client_id, keycloak.creates);
                keycloak
                    .clients
                    .insert((realm_id.to_string(), id.clone()), client.clone());
                Ok(id)
            }
        }
    }

    async fn delete_client(&self, realm_id: &str, client_id: &str) -> Result<(), KeycloakError> {
        let mut keycloak = self.keycloak.lock().unwrap();
        if let Some(error) = &keycloak.failure {
            return Err(error.clone());
        }
        keycloak.deletes += 1;
        keycloak
            .clients
            .remove(&(realm_id.to_string(), client_id.to_string()));
        Ok(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reconciler wired to fresh fakes
pub struct Harness {
    pub secrets: Arc<MapSecretStore>,
    pub realms: Arc<MapRealmStore>,
    pub backend: Arc<FakeBackend>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(global_settings())
    }

    pub fn with_settings(settings: KeycloakSettings) -> Self {
        let secrets = Arc::new(MapSecretStore::default());
        let realms = Arc::new(MapRealmStore::default());
        let backend = Arc::new(FakeBackend::default());
        let reconciler = Reconciler::new(
            Arc::clone(&secrets) as Arc<dyn SecretStore>,
            Arc::clone(&realms) as Arc<dyn RealmStore>,
            Arc::clone(&backend) as Arc<dyn KeycloakBackend>,
            settings,
            ControllerConfig::default(),
        );
        Self {
            secrets,
            realms,
            backend,
            reconciler: Arc::new(reconciler),
        }
    }
}

pub fn global_settings() -> KeycloakSettings {
    KeycloakSettings {
        url: "http://keycloak.identity:8080".to_string(),
        user: Some("admin".to_string()),
        ..KeycloakSettings::default()
    }
}

pub fn realm(namespace: &str, name: &str, connection: Option<KeycloakConnection>) -> Realm {
    let mut realm = Realm::new(
        name,
        RealmSpec {
            realm: RealmRepresentation {
                realm: name.to_string(),
                extra: Map::new(),
            },
            keycloak_connection: connection,
        },
    );
    realm.metadata.namespace = Some(namespace.to_string());
    realm.metadata.generation = Some(1);
    realm
}

/// Connection whose admin password lives in Secret `secret`, key `password`
pub fn password_from(secret: &str) -> KeycloakConnection {
    KeycloakConnection {
        password_secret: Some(SecretRef::external(secret, None, "password")),
        ..KeycloakConnection::default()
    }
}

pub fn client(
    namespace: &str,
    name: &str,
    realm_ref: RealmRef,
    client_secret_ref: Option<SecretRef>,
) -> KeycloakClient {
    let mut client = KeycloakClient::new(
        name,
        ClientSpec {
            realm_ref,
            client: ClientRepresentation {
                client_id: name.to_string(),
                ..ClientRepresentation::default()
            },
            client_secret_ref,
        },
    );
    client.metadata.namespace = Some(namespace.to_string());
    client.metadata.generation = Some(1);
    client
}

pub fn realm_ref(name: &str, namespace: Option<&str>) -> RealmRef {
    RealmRef {
        name: name.to_string(),
        namespace: namespace.map(str::to_string),
    }
}

/// What the runtime does after a reconcile: persist the status on the object
pub fn persisted<K>(mut resource: K, status: KeycloakStatus) -> K
where
    K: HasStatus,
{
    resource.set_status(status);
    resource
}

pub trait HasStatus {
    fn set_status(&mut self, status: KeycloakStatus);
}

impl HasStatus for Realm {
    fn set_status(&mut self, status: KeycloakStatus) {
        self.status = Some(status);
    }
}

impl HasStatus for KeycloakClient {
    fn set_status(&mut self, status: KeycloakStatus) {
        self.status = Some(status);
    }
}

/// Kubernetes API stand-in answering each request with the next queued response
///
/// Requests are recorded as `METHOD /path`. An empty queue answers 500.
pub struct StubApiServer {
    pub client: kube::Client,
    requests: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<(u16, Value)>>>,
}

impl StubApiServer {
    pub async fn start() -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(VecDeque::new()));

        let (log, queue) = (Arc::clone(&requests), Arc::clone(&responses));
        let app = axum::Router::new().fallback(
            move |method: axum::http::Method, uri: axum::http::Uri| {
                let (log, queue) = (Arc::clone(&log), Arc::clone(&queue));
                async move {
                    log.lock().unwrap().push(format!("{method} {}", uri.path()));
                    let (code, body) = queue
                        .lock()
                        .unwrap()
                        .pop_front()
                        .unwrap_or_else(|| (500, api_status(500, "InternalError")));
                    (
                        axum::http::StatusCode::from_u16(code).unwrap(),
                        axum::Json(body),
                    )
                }
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = kube::Config::new(format!("http://{addr}").parse().unwrap());
        Self {
            client: kube::Client::try_from(config).unwrap(),
            requests,
            responses,
        }
    }

    pub fn respond(&self, code: u16, body: Value) {
        self.responses.lock().unwrap().push_back((code, body));
    }

    /// Answer with `object` serialized, as a successful patch does
    pub fn respond_with<T: serde::Serialize>(&self, object: &T) {
        self.respond(200, serde_json::to_value(object).unwrap());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// A `Status` body as the API server sends with failed requests
pub fn api_status(code: u16, reason: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("request failed: {reason}"),
        "reason": reason,
        "code": code,
    })
}
