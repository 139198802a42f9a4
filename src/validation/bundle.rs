//! # Secret Bundle
//!
//! Tree of encrypted secrets as submitted for checking: top-level secrets plus named
//! capabilities, each carrying an `enabled` flag and its own secrets.
//!
//! ```json
//! {
//!   "metadata": { "name": "my-paas" },
//!   "spec": {
//!     "sshSecrets": { "ssh://git@scm/some-repo.git": "<base64 ciphertext>" },
//!     "capabilities": {
//!       "argocd": { "enabled": true, "sshSecrets": { "...": "..." } }
//!     }
//!   }
//! }
//! ```
//!
//! Maps are ordered, so iteration is lexicographic by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named ciphertexts
pub type Secrets = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBundle {
    #[serde(default)]
    pub metadata: BundleMetadata,
    #[serde(default)]
    pub spec: BundleSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Tenant identity the secrets were encrypted for
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    #[serde(default)]
    pub ssh_secrets: Secrets,
    #[serde(default)]
    pub capabilities: BTreeMap<String, Capability>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ssh_secrets: Secrets,
}

impl SecretBundle {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            metadata: BundleMetadata {
                name: tenant.into(),
            },
            spec: BundleSpec::default(),
        }
    }

    /// Add a top-level secret
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, ciphertext: impl Into<String>) -> Self {
        self.spec.ssh_secrets.insert(name.into(), ciphertext.into());
        self
    }

    /// Add a capability
    #[must_use]
    pub fn with_capability(mut self, name: impl Into<String>, capability: Capability) -> Self {
        self.spec.capabilities.insert(name.into(), capability);
        self
    }

    /// Tenant identity the bundle belongs to
    pub fn tenant(&self) -> &str {
        &self.metadata.name
    }

    /// Number of secrets in the whole tree
    pub fn secret_count(&self) -> usize {
        self.spec.ssh_secrets.len()
            + self
                .spec
                .capabilities
                .values()
                .map(|c| c.ssh_secrets.len())
                .sum::<usize>()
    }
}

impl Capability {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ssh_secrets: Secrets::new(),
        }
    }

    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, ciphertext: impl Into<String>) -> Self {
        self.ssh_secrets.insert(name.into(), ciphertext.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_bundle() {
        let json = r#"{
            "apiVersion": "cpet.belastingdienst.nl/v1alpha1",
            "kind": "Paas",
            "metadata": { "name": "my-paas", "labels": { "team": "a" } },
            "spec": {
                "requestor": "team-a",
                "sshSecrets": { "ssh://git@scm/repo.git": "c2VjcmV0" },
                "capabilities": {
                    "sso": { "enabled": false, "sshSecrets": { "ssh://git@scm/sso.git": "eA==" } },
                    "argocd": { "enabled": true }
                }
            }
        }"#;

        let bundle: SecretBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.tenant(), "my-paas");
        assert_eq!(bundle.spec.ssh_secrets["ssh://git@scm/repo.git"], "c2VjcmV0");
        assert!(!bundle.spec.capabilities["sso"].enabled);
        assert!(bundle.spec.capabilities["argocd"].ssh_secrets.is_empty());
        assert_eq!(bundle.secret_count(), 2);
    }

    #[test]
    fn test_deserialize_minimal_bundle() {
        let bundle: SecretBundle = serde_json::from_str("{}").unwrap();
        assert_eq!(bundle, SecretBundle::default());
        assert_eq!(bundle.secret_count(), 0);
    }

    #[test]
    fn test_capabilities_iterate_in_name_order() {
        let bundle = SecretBundle::new("t")
            .with_capability("tekton", Capability::new(true))
            .with_capability("argocd", Capability::new(true))
            .with_capability("sso", Capability::new(false));
        let names: Vec<_> = bundle.spec.capabilities.keys().map(String::as_str).collect();
        assert_eq!(names, ["argocd", "sso", "tekton"]);
    }
}
