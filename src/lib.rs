//! Keycloak Config Operator Library
//!
//! This library provides the core functionality for the Keycloak Config Operator.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use keycloak_config_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod keycloak;
pub mod observability;
pub mod prelude;
pub mod runtime;
