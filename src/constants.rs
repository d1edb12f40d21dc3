//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Field manager name used for status and finalizer patches
pub const FIELD_MANAGER: &str = "keycloak-config-operator";

/// Finalizer guarding removal of resources until the external entity is gone
pub const FINALIZER: &str = "keycloak.operator.io/cleanup";

/// Status message written after a successful import
pub const SUCCESS_MESSAGE: &str = "Successful import";

/// Attribute key under which the realm checksum is kept in status
pub const REALM_CHECKSUM_ATTRIBUTE: &str = "realm-checksum";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default upper bound for a single reconciliation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default periodic resync after a successful reconciliation (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default Fibonacci backoff lower bound (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff upper bound (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting a controller stream that ended (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default number of reconciliations allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default Keycloak base URL
pub const DEFAULT_KEYCLOAK_URL: &str = "http://localhost:8080";

/// Default realm used to obtain admin tokens
pub const DEFAULT_LOGIN_REALM: &str = "master";

/// Default OAuth client used to obtain admin tokens
pub const DEFAULT_ADMIN_CLIENT_ID: &str = "admin-cli";

/// Default OAuth grant type
pub const DEFAULT_GRANT_TYPE: &str = "password";

/// Default Keycloak connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default Keycloak read timeout (seconds)
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Delay before re-running a reconciliation that hit a write conflict (milliseconds)
pub const CONFLICT_REQUEUE_DELAY_MS: u64 = 500;
