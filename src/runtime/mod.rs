//! # Runtime
//!
//! Wires the reconciliation core into `kube_runtime` controllers.
//!
//! - `initialization` - rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop` - one controller per kind plus the Secret and Realm watches
//! - `error_policy` - backoff for failed reconciliations and stream errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use crate::controller::reconciler::status::{
    ensure_finalizer, persist_status, remove_finalizer,
};
use crate::controller::reconciler::{Cleanup, KeycloakResource, Reconciler, ReconcilerError};
use crate::crd::SyncState;
use crate::observability::metrics;
use kube::{Client, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Shared state handed to every reconciliation
pub struct Context {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// `Kind/namespace/name`, the key of per-resource backoff state
pub(crate) fn resource_label<K: KeycloakResource>(resource: &K) -> String {
    format!(
        "{}/{}/{}",
        K::KIND,
        resource.namespace().unwrap_or_default(),
        resource.name_any()
    )
}

/// Reconcile one Realm or Client
///
/// Domain failures end up in status and drive the requeue delay; only
/// Kubernetes API failures are returned as errors.
pub async fn reconcile<K: KeycloakResource>(
    resource: Arc<K>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcilerError> {
    let span = tracing::info_span!(
        "reconcile",
        resource.kind = K::KIND,
        resource.namespace = resource.namespace().unwrap_or_default(),
        resource.name = resource.name_any(),
        resource.generation = resource.meta().generation.unwrap_or(0)
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(K::KIND);
        let label = resource_label(resource.as_ref());

        if resource.meta().deletion_timestamp.is_some() {
            return finalize(resource.as_ref(), &ctx, &label).await;
        }

        let resource = match ensure_finalizer(&ctx.client, resource.as_ref()).await? {
            Some(patched) => Arc::new(patched),
            None => resource,
        };

        let status = resource.apply(&ctx.reconciler).await;
        persist_status(&ctx.client, resource.as_ref(), &status).await?;
        metrics::observe_reconciliation_duration(K::KIND, start.elapsed().as_secs_f64());

        if status.state == SyncState::Success {
            if ctx.reconciler.reset_backoff(&label) {
                info!("Recovered after previous failures");
            }
            metrics::increment_requeues(K::KIND, "resync");
            Ok(Action::requeue(ctx.reconciler.config.resync_interval()))
        } else {
            let (delay, error_count) = ctx.reconciler.next_backoff(&label);
            debug!(
                delay_secs = delay.as_secs(),
                error_count, "Reconciliation failed, retrying with backoff"
            );
            metrics::increment_requeues(K::KIND, "error-backoff");
            Ok(Action::requeue(delay))
        }
    }
    .instrument(span)
    .await
}

async fn finalize<K: KeycloakResource>(
    resource: &K,
    ctx: &Context,
    label: &str,
) -> Result<Action, ReconcilerError> {
    match resource.cleanup(&ctx.reconciler).await {
        Cleanup::RemoveFinalizer => {
            remove_finalizer(&ctx.client, resource).await?;
            ctx.reconciler.reset_backoff(label);
            metrics::increment_cleanups(K::KIND, "removed");
            info!("Cleanup complete");
            Ok(Action::await_change())
        }
        Cleanup::KeepFinalizer(status) => {
            persist_status(&ctx.client, resource, &status).await?;
            metrics::increment_cleanups(K::KIND, "blocked");
            let (delay, error_count) = ctx.reconciler.next_backoff(label);
            info!(
                delay_secs = delay.as_secs(),
                error_count, "Cleanup failed, deletion blocked until it succeeds"
            );
            metrics::increment_requeues(K::KIND, "cleanup-backoff");
            Ok(Action::requeue(delay))
        }
    }
}
