//! # Initialization
//!
//! Operator initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, KeycloakSettings};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::KubeStore;
use crate::crd::{KeycloakClient, Realm};
use crate::keycloak::HttpKeycloakBackend;
use crate::observability;
use crate::runtime::Context;
use anyhow::{Context as _, Result};
use kube::api::ListParams;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{info, warn};

/// Initialization result containing all necessary components for the operator
pub struct InitializationResult {
    /// Shared reconciliation context
    pub ctx: Arc<Context>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Effective controller configuration
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keycloak_config_operator=info".into()),
        )
        .init();
}

/// Initialize the operator runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
///
/// # Errors
///
/// Fails when the HTTP port cannot be bound or no Kubernetes client can be created.
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting Keycloak Config Operator");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    start_server(config.metrics_port, server_state.clone())
        .await
        .with_context(|| format!("Failed to start HTTP server on port {}", config.metrics_port))?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    check_crds_installed(&client, &config).await;

    let settings = KeycloakSettings::from_env();
    info!(url = %settings.url, login_realm = %settings.login_realm, "Keycloak defaults loaded");

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        store,
        Arc::new(HttpKeycloakBackend),
        settings,
        config.clone(),
    ));

    info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        concurrency = config.max_concurrent_reconciliations,
        "Operator initialized, starting watch loop..."
    );

    Ok(InitializationResult {
        ctx: Arc::new(Context { client, reconciler }),
        server_state,
        config,
    })
}

/// Warn early when a CRD is missing instead of failing inside the watch
async fn check_crds_installed(client: &Client, config: &ControllerConfig) {
    let params = ListParams::default().limit(1);
    let realms: Api<Realm> = match config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let clients: Api<KeycloakClient> = match config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    if let Err(e) = realms.list(&params).await {
        warn!("Realm CRD is not queryable, install it with `crdgen | kubectl apply -f -`: {}", e);
    }
    if let Err(e) = clients.list(&params).await {
        warn!("Client CRD is not queryable, install it with `crdgen | kubectl apply -f -`: {}", e);
    }
}
