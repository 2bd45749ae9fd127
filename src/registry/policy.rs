//! Registry policy store
//!
//! Immutable snapshot of which registries may be used: the ordered list of
//! additional registries searched after the public default, and the blocked
//! registries (explicit hosts, the public default, or everything). Built once
//! from a [`PolicyConfig`] at startup and shared read-only afterwards.

use crate::config::{BLOCK_ALL, BLOCK_PUBLIC, PolicyConfig};
use crate::error::{ResolverError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Canonical name of the public default registry
pub const PUBLIC_REGISTRY: &str = "docker.io";

/// Other names under which the public default registry is known
pub const PUBLIC_REGISTRY_ALIASES: &[&str] = &["index.docker.io", "registry-1.docker.io"];

/// Namespace of official images on the public registry
pub const OFFICIAL_NAMESPACE: &str = "library";

/// Lowercase a host, drop a trailing slash and fold public aliases into
/// [`PUBLIC_REGISTRY`].
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/').to_ascii_lowercase();
    if PUBLIC_REGISTRY_ALIASES.contains(&host.as_str()) {
        PUBLIC_REGISTRY.to_string()
    } else {
        host
    }
}

/// Split `host[:port]` into name and port; bracketed IPv6 literals
/// (`[::1]:5000`) keep their colons in the name.
pub fn split_port(host: &str) -> (&str, Option<&str>) {
    if host.starts_with('[') {
        match host.find(']') {
            Some(end) => {
                let (name, rest) = host.split_at(end + 1);
                (name, rest.strip_prefix(':'))
            }
            None => (host, None),
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) => (name, Some(port)),
            None => (host, None),
        }
    }
}

pub fn is_public_registry(host: &str) -> bool {
    normalize_host(host) == PUBLIC_REGISTRY
}

/// Check that `host` is a bare `name[:port]` and return its normalized form
fn validate_host(host: &str) -> Result<String> {
    let normalized = normalize_host(host);
    let malformed = |reason: &str| {
        ResolverError::Config(format!("invalid registry host '{}': {}", host.trim(), reason))
    };

    if normalized.is_empty() {
        return Err(malformed("empty host"));
    }
    if normalized.contains("://") {
        return Err(malformed("scheme is not allowed"));
    }
    if normalized
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#'))
    {
        return Err(malformed("expected host[:port]"));
    }
    if let (_, Some(port)) = split_port(&normalized) {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(malformed("port must be a number between 1 and 65535")),
        }
    }

    let url = url::Url::parse(&format!("https://{}/", normalized))
        .map_err(|e| malformed(&e.to_string()))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(malformed("missing host name"));
    }

    Ok(normalized)
}

/// Serializable view of the effective policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub public_registry: String,
    pub additional_registries: Vec<String>,
    pub blocked_registries: Vec<String>,
    pub block_public: bool,
    pub block_all: bool,
}

/// Immutable registry policy snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryPolicy {
    additional: Vec<String>,
    blocked: BTreeSet<String>,
    block_public: bool,
    block_all: bool,
}

impl RegistryPolicy {
    /// Policy with no additional and no blocked registries
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Build the policy, failing on malformed hosts.
    ///
    /// Duplicate additional registries keep their first position.
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        config.validate()?;

        let mut additional: Vec<String> = Vec::new();
        for entry in &config.additional_registries {
            let host = validate_host(entry)?;
            if !additional.contains(&host) {
                additional.push(host);
            }
        }

        let mut blocked = BTreeSet::new();
        let mut block_public = false;
        let mut block_all = false;
        for entry in &config.block_registries {
            let token = entry.trim();
            if token.eq_ignore_ascii_case(BLOCK_ALL) {
                block_all = true;
            } else if token.eq_ignore_ascii_case(BLOCK_PUBLIC) || is_public_registry(token) {
                block_public = true;
            } else {
                blocked.insert(validate_host(token)?);
            }
        }

        let policy = Self {
            additional,
            blocked,
            block_public,
            block_all,
        };
        debug!(
            additional = ?policy.additional,
            blocked = ?policy.blocked,
            block_public,
            block_all,
            "registry policy initialized"
        );
        Ok(policy)
    }

    /// Whether `host` may not be used for any operation
    pub fn is_blocked(&self, host: &str) -> bool {
        if self.block_all {
            return true;
        }
        let host = normalize_host(host);
        if self.block_public && host == PUBLIC_REGISTRY {
            return true;
        }
        self.blocked.contains(&host)
    }

    /// Search order for unqualified references: the public default followed by
    /// the additional registries, with blocked hosts skipped entirely.
    pub fn candidate_hosts(&self) -> Vec<String> {
        std::iter::once(PUBLIC_REGISTRY.to_string())
            .chain(self.additional.iter().cloned())
            .filter(|host| !self.is_blocked(host))
            .collect()
    }

    pub fn additional_registries(&self) -> &[String] {
        &self.additional
    }

    pub fn blocks_all(&self) -> bool {
        self.block_all
    }

    pub fn blocks_public(&self) -> bool {
        self.block_public
    }

    pub fn describe(&self) -> PolicySummary {
        PolicySummary {
            public_registry: PUBLIC_REGISTRY.to_string(),
            additional_registries: self.additional.clone(),
            blocked_registries: self.blocked.iter().cloned().collect(),
            block_public: self.block_public,
            block_all: self.block_all,
        }
    }
}
