//! # Controller
//!
//! Core controller modules for the Keycloak Config Operator.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `connection`: Effective Keycloak connection for one resource
//! - `dependency_index`: Primary to Secret/Realm dependency tracking
//! - `reconciler`: Core reconciliation logic for Realms and Clients
//! - `scope`: Admin session lifetime around one reconciliation
//! - `secrets`: Secret key resolution
//! - `server`: HTTP server for metrics and health checks
//! - `store`: Read access to Secrets and Realms

pub mod backoff;
pub mod connection;
pub mod dependency_index;
pub mod reconciler;
pub mod scope;
pub mod secrets;
pub mod server;
pub mod store;
