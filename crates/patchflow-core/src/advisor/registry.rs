//! Prompt registry: injected role -> prompt version mapping.
//!
//! Explicit get/set instead of module-level mutable state, so tests can pin
//! prompt versions and cross-call coupling stays visible.

use std::collections::HashMap;

/// Role under which diagnosis prompts are issued.
pub const ROLE_DIAGNOSIS: &str = "diagnosis";

const DEFAULT_VERSION: &str = "v1";

/// Name-indexed registry of prompt versions.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    versions: HashMap<String, String>,
}

impl PromptRegistry {
    /// Create a registry with every role at the default version.
    pub fn new() -> Self {
        Self {
            versions: HashMap::new(),
        }
    }

    /// Pin a role to a prompt version, replacing any existing pin.
    pub fn set(&mut self, role: impl Into<String>, version: impl Into<String>) {
        self.versions.insert(role.into(), version.into());
    }

    /// The prompt version for a role (default version if unpinned).
    pub fn get(&self, role: &str) -> &str {
        self.versions
            .get(role)
            .map(String::as_str)
            .unwrap_or(DEFAULT_VERSION)
    }

    /// List all pinned roles.
    pub fn roles(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}
