//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and controller stream errors.

use crate::constants::CONFLICT_REQUEUE_DELAY_MS;
use crate::controller::reconciler::{KeycloakResource, ReconcilerError};
use crate::observability::metrics;
use crate::runtime::{resource_label, Context};
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Domain failures never reach this function: they are written to status by
/// the reconcile function. What arrives here are Kubernetes API failures
/// (status or finalizer patches) and optimistic-concurrency conflicts.
pub fn handle_reconciliation_error<K: KeycloakResource>(
    resource: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Context>,
) -> Action {
    let label = resource_label(resource.as_ref());

    if error.is_conflict() {
        debug!(kind = K::KIND, resource = %label, "Resource changed underneath, reconciling again");
        metrics::increment_requeues(K::KIND, "conflict");
        return Action::requeue(Duration::from_millis(CONFLICT_REQUEUE_DELAY_MS));
    }

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = K::KIND,
        resource.name = %label,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}: {}", K::KIND, label, error);
    metrics::increment_reconciliation_errors(K::KIND, error.metric_label());

    let (delay, error_count) = ctx.reconciler.next_backoff(&label);
    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        delay.as_secs(),
        error_count
    );
    metrics::increment_requeues(K::KIND, "error-backoff");
    Action::requeue(delay)
}

/// Log an error surfaced on the controller's output stream
///
/// Reconciler failures were already handled by the error policy; watch
/// failures are retried by the stream's own backoff.
pub fn handle_controller_stream_error<K: KeycloakResource>(
    error: &controller::Error<ReconcilerError, watcher::Error>,
) {
    match error {
        controller::Error::ReconcilerFailed(err, obj) => {
            debug!(kind = K::KIND, object = %obj, error = %err, "controller.reconcile.failed");
        }
        controller::Error::ObjectNotFound(obj) => {
            debug!(kind = K::KIND, object = %obj, "Object no longer exists (likely deleted)");
        }
        controller::Error::QueueError(watch_error) => {
            let error_string = watch_error.to_string();
            let is_not_found = error_string.contains("404") || error_string.contains("NotFound");
            let is_401 = (error_string.contains("401") || error_string.contains("Unauthorized"))
                && !is_not_found;
            let is_410 = error_string.contains("410")
                || error_string.contains("too old resource version")
                || error_string.contains("Gone");

            if is_401 {
                error!(
                    kind = K::KIND,
                    "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
                );
            } else if is_410 {
                warn!(
                    kind = K::KIND,
                    "Watch resource version expired (410) - watch will restart"
                );
            } else if is_not_found {
                warn!(
                    kind = K::KIND,
                    error = %error_string,
                    "Watched resource not found (404) - is the CRD installed?"
                );
            } else {
                error!(kind = K::KIND, error = %error_string, "Controller stream error");
            }
        }
        other => {
            error!(kind = K::KIND, error = %other, "Controller stream error");
        }
    }
}
