//! # Keycloak Status
//!
//! Status record shared by Realm and Client.
//!
//! The record is value-only: reconcilers compute a new one from the previous
//! record plus the outcome of the current attempt, and the runtime persists it.

use crate::constants::SUCCESS_MESSAGE;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of the last attempted reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Success,
    Error,
    #[default]
    Unknown,
}

impl SyncState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Success => "SUCCESS",
            SyncState::Error => "ERROR",
            SyncState::Unknown => "UNKNOWN",
        }
    }
}

/// Status of a Realm or Client resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakStatus {
    /// Outcome of the last attempted reconciliation
    #[serde(default)]
    pub state: SyncState,
    /// Identifier of the entity in Keycloak; once set, the next import looks the entity up by it
    #[serde(default)]
    pub external_id: Option<String>,
    /// Human-readable outcome of the last attempt
    #[serde(default)]
    pub message: Option<String>,
    /// Time of the last attempt (epoch milliseconds)
    #[serde(default)]
    pub last_update: Option<i64>,
    /// Generation the last attempt was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Bookkeeping owned by the Keycloak client (e.g. checksums)
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl KeycloakStatus {
    /// Status after a successful import of `external_id`
    #[must_use]
    pub fn success(
        external_id: String,
        attributes: BTreeMap<String, Vec<String>>,
        generation: Option<i64>,
    ) -> Self {
        Self {
            state: SyncState::Success,
            external_id: Some(external_id),
            message: Some(SUCCESS_MESSAGE.to_string()),
            last_update: Some(chrono::Utc::now().timestamp_millis()),
            observed_generation: generation,
            attributes,
        }
    }

    /// Status after a failed attempt
    ///
    /// The external identity and attributes of `previous` are kept: a failure
    /// does not mean the external entity disappeared.
    #[must_use]
    pub fn failure(
        previous: Option<&KeycloakStatus>,
        error: &impl std::fmt::Display,
        generation: Option<i64>,
    ) -> Self {
        Self {
            state: SyncState::Error,
            external_id: previous.and_then(|s| s.external_id.clone()),
            message: Some(error.to_string()),
            last_update: Some(chrono::Utc::now().timestamp_millis()),
            observed_generation: generation,
            attributes: previous.map(|s| s.attributes.clone()).unwrap_or_default(),
        }
    }

    /// True when the content differs from `other` beyond the timestamp
    #[must_use]
    pub fn differs_from(&self, other: &KeycloakStatus) -> bool {
        self.state != other.state
            || self.external_id != other.external_id
            || self.message != other.message
            || self.observed_generation != other.observed_generation
            || self.attributes != other.attributes
    }
}
