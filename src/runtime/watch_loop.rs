//! # Watch Loop
//!
//! Controller watch loops for `Realm` and `Client` resources.
//!
//! Primaries are read through a reflector stream filtered by the generation
//! predicate, so the operator's own status patches do not trigger another
//! reconciliation. Secrets (and, for Clients, Realms) are watched metadata
//! only and in every namespace, as references may cross namespaces. Each
//! event is mapped through a [`DependencyIndex`] to the primaries that
//! reference the changed object.

use crate::config::ControllerConfig;
use crate::controller::dependency_index::DependencyIndex;
use crate::controller::reconciler::KeycloakResource;
use crate::controller::server::ServerState;
use crate::crd::{KeycloakClient, Realm, ResourceKey};
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_controller_stream_error, handle_reconciliation_error};
use crate::runtime::{reconcile, Context};
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{
    controller, metadata_watcher, predicates, reflector, watcher, Controller, WatchStreamExt,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Namespaces each watch covers
///
/// Primaries follow `WATCH_NAMESPACE`. Secrets and Realms are watched in every
/// namespace, since a reference may name an object outside the watched one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchScope {
    namespace: Option<String>,
}

impl WatchScope {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            namespace: config.watch_namespace.clone(),
        }
    }

    /// Api for the kind a controller reconciles
    #[must_use]
    pub fn primary_api<K>(&self, client: Client) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::all(client),
        }
    }

    /// Api for an object primaries reference, in every namespace
    #[must_use]
    pub fn secondary_api<K>(client: Client) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::all(client)
    }
}

/// Reflector-backed stream of primaries, skipping status-only updates
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: watcher::Config,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// Primaries of kind `K` that `index` records as depending on the object `meta`
fn dependents<K: KeycloakResource>(index: &DependencyIndex, meta: &ObjectMeta) -> Vec<ObjectRef<K>> {
    let Some(key) = ResourceKey::from_meta(meta) else {
        return Vec::new();
    };
    let primaries = index.primaries_depending_on(&key);
    if !primaries.is_empty() {
        debug!(
            index = index.name(),
            object = %key,
            dependents = primaries.len(),
            "Secondary changed, enqueueing dependents"
        );
    }
    primaries
        .into_iter()
        .map(|primary| ObjectRef::new(&primary.name).within(&primary.namespace))
        .collect()
}

async fn drain<K: KeycloakResource>(
    results: impl Stream<
        Item = Result<
            (ObjectRef<K>, kube_runtime::controller::Action),
            controller::Error<crate::controller::reconciler::ReconcilerError, watcher::Error>,
        >,
    >,
) {
    results
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => debug!(kind = K::KIND, object = %obj, ?action, "watch.event.reconciled"),
                Err(e) => handle_controller_stream_error::<K>(&e),
            }
        })
        .await;
}

/// Run the `Realm` controller until the stream ends
pub async fn run_realm_controller(ctx: Arc<Context>, config: &ControllerConfig) {
    let scope = WatchScope::new(config);
    let watcher_config = watcher::Config::default();
    let realms: Api<Realm> = scope.primary_api(ctx.client.clone());
    let secrets: Api<Secret> = WatchScope::secondary_api(ctx.client.clone());

    let (reader, realm_stream) = create_filtered_stream(realms, watcher_config.clone());
    let reconciler = ctx.reconciler.clone();

    let results = Controller::for_stream(realm_stream, reader)
        .watches_stream(
            metadata_watcher(secrets, watcher_config)
                .touched_objects()
                .default_backoff(),
            move |secret| {
                let refs = dependents::<Realm>(&reconciler.realm_secrets, &secret.metadata);
                metrics::increment_secret_triggered_reconciles(Realm::KIND, refs.len());
                refs
            },
        )
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
        .shutdown_on_signal()
        .run(
            reconcile::<Realm>,
            handle_reconciliation_error::<Realm>,
            ctx,
        );
    drain(results).await;
}

/// Run the `Client` controller until the stream ends
pub async fn run_client_controller(ctx: Arc<Context>, config: &ControllerConfig) {
    let scope = WatchScope::new(config);
    let watcher_config = watcher::Config::default();
    let clients: Api<KeycloakClient> = scope.primary_api(ctx.client.clone());
    let secrets: Api<Secret> = WatchScope::secondary_api(ctx.client.clone());
    let realms: Api<Realm> = WatchScope::secondary_api(ctx.client.clone());

    let (reader, client_stream) = create_filtered_stream(clients, watcher_config.clone());
    let by_secret = ctx.reconciler.clone();
    let by_realm = ctx.reconciler.clone();

    let results = Controller::for_stream(client_stream, reader)
        .watches_stream(
            metadata_watcher(secrets, watcher_config.clone())
                .touched_objects()
                .default_backoff(),
            move |secret| {
                let refs =
                    dependents::<KeycloakClient>(&by_secret.client_secrets, &secret.metadata);
                metrics::increment_secret_triggered_reconciles(KeycloakClient::KIND, refs.len());
                refs
            },
        )
        .watches_stream(
            metadata_watcher(realms, watcher_config)
                .touched_objects()
                .default_backoff(),
            move |realm| dependents::<KeycloakClient>(&by_realm.client_realms, &realm.metadata),
        )
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
        .shutdown_on_signal()
        .run(
            reconcile::<KeycloakClient>,
            handle_reconciliation_error::<KeycloakClient>,
            ctx,
        );
    drain(results).await;
}

/// Resolves once SIGINT or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Run both controllers, restarting a controller whose stream ends
///
/// Returns once a shutdown signal was received and in-flight
/// reconciliations have drained.
pub async fn run_watch_loop(
    ctx: Arc<Context>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let shutdown_state = server_state.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    server_state.set_ready(true);

    let realm_loop = restart_loop("Realm", &server_state, &config, || {
        run_realm_controller(ctx.clone(), &config)
    });
    let client_loop = restart_loop("Client", &server_state, &config, || {
        run_client_controller(ctx.clone(), &config)
    });
    tokio::join!(realm_loop, client_loop);

    info!("Controller stopped gracefully");
    Ok(())
}

async fn restart_loop<F, Fut>(
    kind: &'static str,
    server_state: &ServerState,
    config: &ControllerConfig,
    run: F,
) where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    loop {
        info!(kind, "Starting controller watch loop...");
        run().await;

        if !server_state.is_ready() {
            info!(kind, "Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            kind,
            "Controller watch stream ended, restarting in {} seconds...",
            config.watch_restart_delay_secs
        );
        tokio::time::sleep(config.watch_restart_delay()).await;

        // The controller may observe the signal before the shutdown task does
        if !server_state.is_ready() {
            info!(kind, "Shutdown requested, exiting watch loop");
            break;
        }
    }
}
