//! Registry policy configuration
//!
//! The policy is assembled once at startup from up to three sources, lowest
//! precedence first: a JSON file, environment variables, command line flags.
//! List values from every source are concatenated in that order, so the search
//! order of additional registries follows declaration order across sources.

use crate::error::{ResolverError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Comma-separated additional registries
pub const ENV_ADD_REGISTRY: &str = "DOCKER_RESOLVER_ADD_REGISTRY";
/// Comma-separated blocked registries (hosts, `public` or `all`)
pub const ENV_BLOCK_REGISTRY: &str = "DOCKER_RESOLVER_BLOCK_REGISTRY";

/// Token blocking every registry
pub const BLOCK_ALL: &str = "all";
/// Token blocking the public default registry
pub const BLOCK_PUBLIC: &str = "public";

/// Unvalidated policy settings as supplied by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PolicyConfig {
    /// Registries searched after the public default, in order
    pub additional_registries: Vec<String>,
    /// Blocked hosts, or the `public` / `all` tokens
    pub block_registries: Vec<String>,
}

impl PolicyConfig {
    pub fn new(additional_registries: Vec<String>, block_registries: Vec<String>) -> Self {
        Self {
            additional_registries,
            block_registries,
        }
    }

    /// Load a JSON policy file such as
    /// `{"additional-registries": ["registry.example.com"], "block-registries": ["public"]}`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResolverError::Config(format!(
                "Failed to read policy file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ResolverError::Config(format!(
                "Failed to parse policy file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_env_values(
            std::env::var(ENV_ADD_REGISTRY).ok().as_deref(),
            std::env::var(ENV_BLOCK_REGISTRY).ok().as_deref(),
        )
    }

    fn from_env_values(additional: Option<&str>, blocked: Option<&str>) -> Self {
        Self {
            additional_registries: additional.map(split_list).unwrap_or_default(),
            block_registries: blocked.map(split_list).unwrap_or_default(),
        }
    }

    /// Append another source's lists after this one's
    pub fn merge(mut self, other: &PolicyConfig) -> Self {
        self.additional_registries
            .extend(other.additional_registries.iter().cloned());
        self.block_registries
            .extend(other.block_registries.iter().cloned());
        self
    }

    /// Assemble the effective configuration: file, then environment, then flags
    pub fn load(config_file: Option<&Path>, flags: &PolicyConfig) -> Result<Self> {
        let base = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.merge(&Self::from_env()).merge(flags);
        config.validate()?;
        Ok(config)
    }

    /// Shallow checks; host syntax is verified when the policy is built
    pub fn validate(&self) -> Result<()> {
        for entry in &self.additional_registries {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(ResolverError::Config(
                    "additional registry cannot be empty".to_string(),
                ));
            }
            if entry.eq_ignore_ascii_case(BLOCK_ALL) || entry.eq_ignore_ascii_case(BLOCK_PUBLIC) {
                return Err(ResolverError::Config(format!(
                    "'{}' is not a registry host and cannot be added as an additional registry",
                    entry
                )));
            }
        }
        if self.block_registries.iter().any(|b| b.trim().is_empty()) {
            return Err(ResolverError::Config(
                "blocked registry cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_values_split() {
        let config = PolicyConfig::from_env_values(Some("a.example.com, b.example.com,"), Some("public"));
        assert_eq!(
            config.additional_registries,
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
        assert_eq!(config.block_registries, vec!["public".to_string()]);
    }

    #[test]
    fn test_merge_keeps_declaration_order() {
        let file = PolicyConfig::new(vec!["file.example.com".to_string()], vec![]);
        let flags = PolicyConfig::new(vec!["flag.example.com".to_string()], vec!["all".to_string()]);
        let merged = file.merge(&flags);
        assert_eq!(
            merged.additional_registries,
            vec!["file.example.com".to_string(), "flag.example.com".to_string()]
        );
        assert_eq!(merged.block_registries, vec!["all".to_string()]);
    }

    #[test]
    fn test_validate_rejects_sentinels_as_additional() {
        let config = PolicyConfig::new(vec!["all".to_string()], vec![]);
        assert!(matches!(config.validate(), Err(ResolverError::Config(_))));

        let config = PolicyConfig::new(vec![" ".to_string()], vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"additional-registries": ["registry.example.com:5000"], "block-registries": ["public"]}}"#
        )
        .unwrap();

        let config = PolicyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.additional_registries, vec!["registry.example.com:5000".to_string()]);
        assert_eq!(config.block_registries, vec!["public".to_string()]);
    }

    #[test]
    fn test_from_file_missing_keys_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let config = PolicyConfig::from_file(file.path()).unwrap();
        assert_eq!(config, PolicyConfig::default());
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PolicyConfig::from_file(file.path()),
            Err(ResolverError::Config(_))
        ));
    }
}
