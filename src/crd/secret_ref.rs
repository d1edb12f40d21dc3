//! # Secret References
//!
//! Credentials are either inlined (`immediateValue`) or read from a key of a
//! Kubernetes Secret. The namespace of an external reference is optional and
//! defaults to the namespace of the referencing resource, applied when the
//! reference is resolved rather than when it is declared.

use crate::crd::ResourceKey;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a credential value
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum SecretRef {
    /// Value given inline in the resource
    Immediate {
        #[serde(rename = "immediateValue")]
        immediate_value: String,
    },
    /// Value stored under `key` in the Secret `namespace/name`
    External {
        name: String,
        /// Defaults to the namespace of the referencing resource
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        key: String,
    },
}

impl std::fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretRef::Immediate { .. } => f
                .debug_struct("Immediate")
                .field("immediate_value", &"***")
                .finish(),
            SecretRef::External {
                name,
                namespace,
                key,
            } => f
                .debug_struct("External")
                .field("name", name)
                .field("namespace", namespace)
                .field("key", key)
                .finish(),
        }
    }
}

impl SecretRef {
    pub fn immediate(value: impl Into<String>) -> Self {
        SecretRef::Immediate {
            immediate_value: value.into(),
        }
    }

    pub fn external(name: impl Into<String>, namespace: Option<&str>, key: impl Into<String>) -> Self {
        SecretRef::External {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            key: key.into(),
        }
    }

    /// Key of the referenced Secret, with the default namespace applied
    ///
    /// Immediate values reference nothing and yield `None`.
    #[must_use]
    pub fn secret_key(&self, default_namespace: &str) -> Option<ResourceKey> {
        match self {
            SecretRef::Immediate { .. } => None,
            SecretRef::External {
                name, namespace, ..
            } => Some(ResourceKey::new(
                namespace.as_deref().unwrap_or(default_namespace),
                name.as_str(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_immediate_value() {
        let reference: SecretRef =
            serde_json::from_value(serde_json::json!({"immediateValue": "admin"})).unwrap();
        assert_eq!(reference, SecretRef::immediate("admin"));
        assert_eq!(reference.secret_key("default"), None);
    }

    #[test]
    fn test_deserialize_external_without_namespace() {
        let reference: SecretRef =
            serde_json::from_value(serde_json::json!({"name": "kc-admin", "key": "password"}))
                .unwrap();
        assert_eq!(reference, SecretRef::external("kc-admin", None, "password"));
    }

    #[test]
    fn test_secret_key_applies_default_namespace_at_resolution() {
        let implicit = SecretRef::external("kc-admin", None, "password");
        assert_eq!(
            implicit.secret_key("team-a"),
            Some(ResourceKey::new("team-a", "kc-admin"))
        );
        assert_eq!(
            implicit.secret_key("team-b"),
            Some(ResourceKey::new("team-b", "kc-admin"))
        );

        let explicit = SecretRef::external("kc-admin", Some("shared"), "password");
        assert_eq!(
            explicit.secret_key("team-a"),
            Some(ResourceKey::new("shared", "kc-admin"))
        );
    }

    #[test]
    fn test_debug_hides_immediate_value() {
        let rendered = format!("{:?}", SecretRef::immediate("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
