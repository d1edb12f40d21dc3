//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use keycloak_config_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Keycloak admin seam
pub use crate::keycloak::{KeycloakBackend, KeycloakError, KeycloakSession};

// Reconciler types
pub use crate::controller::reconciler::{
    BackoffState, Cleanup, KeycloakResource, Reconciler, ReconcilerError,
};
pub use crate::controller::store::{RealmStore, SecretStore};

// Config types
pub use crate::config::{ControllerConfig, KeycloakSettings};
