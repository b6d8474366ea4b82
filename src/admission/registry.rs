//! Resource rule configuration.
//!
//! This module loads the mapping from resource to rule list, either from a YAML
//! rules file or programmatically through [`RuleRegistryBuilder`]. The result is
//! an immutable [`RuleRegistry`] that is shared read-only by every check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::rule::Rule;
use crate::error::{Result, WardenError};

/// Rules file contents, as written by operators.
///
/// ```yaml
/// resources:
///   /api/orders:
///     - kind: count_in_window
///       max_count: 3
///       window_ms: 60000
///     - kind: min_spacing
///       min_spacing_ms: 500
///   /health: []
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Map of resource identifier to the rules applied to it, in order
    #[serde(default)]
    pub resources: HashMap<String, Vec<RuleConfig>>,
}

/// A single configured rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleConfig {
    /// At most `max_count` requests per trailing `window_ms`
    CountInWindow { max_count: usize, window_ms: u64 },
    /// More than `min_spacing_ms` between consecutive requests
    MinSpacing { min_spacing_ms: u64 },
}

impl TryFrom<&RuleConfig> for Rule {
    type Error = WardenError;

    fn try_from(config: &RuleConfig) -> Result<Self> {
        match *config {
            RuleConfig::CountInWindow {
                max_count,
                window_ms,
            } => Rule::count_in_window(max_count, Duration::from_millis(window_ms)),
            RuleConfig::MinSpacing { min_spacing_ms } => {
                Rule::min_spacing(Duration::from_millis(min_spacing_ms))
            }
        }
    }
}

impl RulesConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading admission rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| WardenError::Config(format!("Failed to parse rules config: {}", e)))
    }

    /// Validate every rule and build the registry.
    pub fn into_registry(self) -> Result<RuleRegistry> {
        let mut builder = RuleRegistry::builder();
        for (resource, rules) in &self.resources {
            let rules = rules
                .iter()
                .map(Rule::try_from)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| WardenError::Config(format!("resource '{}': {}", resource, e)))?;
            builder = builder.resource(resource.clone(), rules);
        }
        Ok(builder.build())
    }
}

/// Immutable mapping from resource identifier to its ordered rules.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Vec<Rule>>,
}

impl RuleRegistry {
    /// Start building a registry.
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder::default()
    }

    /// The rules configured for `resource`, in evaluation order.
    ///
    /// Unknown resources have no rules.
    pub fn rules_for(&self, resource: &str) -> &[Rule] {
        self.rules.get(resource).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of resources with an entry (including empty rule lists).
    pub fn resource_count(&self) -> usize {
        self.rules.len()
    }
}

/// Builder for [`RuleRegistry`].
#[derive(Debug, Default)]
pub struct RuleRegistryBuilder {
    rules: HashMap<String, Vec<Rule>>,
}

impl RuleRegistryBuilder {
    /// Set the rules for a resource, replacing any set earlier.
    pub fn resource(mut self, resource: impl Into<String>, rules: Vec<Rule>) -> Self {
        self.rules.insert(resource.into(), rules);
        self
    }

    pub fn build(self) -> RuleRegistry {
        RuleRegistry { rules: self.rules }
    }
}
