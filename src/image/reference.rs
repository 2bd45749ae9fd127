//! Image reference parsing
//!
//! Splits references such as `busybox`, `dockercli/busybox:t1`,
//! `localhost:5000/library/hello-world` or `quay.io/org/app@sha256:...` into
//! an optional registry host, a repository path and a tag-or-digest selector.
//! Whether an unqualified path is rewritten to the official `library/`
//! namespace is a registry decision and happens in the resolver, not here.

use crate::error::{ResolverError, Result};
use crate::image::digest::DigestUtils;
use crate::registry::policy::split_port;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Tag used when a reference names neither a tag nor a digest
pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// Tag or digest selecting one image of a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selector {
    Tag(String),
    Digest(String),
}

impl Selector {
    pub fn as_str(&self) -> &str {
        match self {
            Selector::Tag(value) | Selector::Digest(value) => value,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Tag(tag) => write!(f, ":{}", tag),
            Selector::Digest(digest) => write!(f, "@{}", digest),
        }
    }
}

/// Parsed image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Explicit registry host; `None` for unqualified references
    pub host: Option<String>,
    /// Repository path as written by the user (never empty)
    pub path: String,
    pub selector: Selector,
    /// False when the selector is the implied `latest`
    pub explicit_selector: bool,
}

impl Reference {
    /// Parse a reference string.
    ///
    /// Supported forms:
    /// - `busybox` → path `busybox`, tag `latest` (implied)
    /// - `dockercli/busybox:t1` → path `dockercli/busybox`, tag `t1`
    /// - `localhost:5000/dockercli/busybox` → host `localhost:5000`
    /// - `quay.io/org/app@sha256:<hex>` → host `quay.io`, digest selector
    ///
    /// A reference carrying both a tag and a digest keeps only the digest.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ResolverError::InvalidReference(
                "empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                DigestUtils::validate(digest)?;
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A tag may only follow the last path separator, so `host:5000/repo`
        // never mistakes the port for a tag.
        let last_slash = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_slash..].rfind(':') {
            Some(colon) => {
                let colon = last_slash + colon;
                (&name_tag[..colon], Some(&name_tag[colon + 1..]))
            }
            None => (name_tag, None),
        };

        if let Some(tag) = tag {
            validate_tag(tag)?;
        }

        let (host, path) = split_host(name)?;
        validate_path(path, reference)?;

        let (selector, explicit_selector) = match (digest, tag) {
            (Some(digest), _) => (Selector::Digest(digest), true),
            (None, Some(tag)) => (Selector::Tag(tag.to_string()), true),
            (None, None) => (Selector::Tag(DEFAULT_TAG.to_string()), false),
        };

        Ok(Reference {
            host,
            path: path.to_string(),
            selector,
            explicit_selector,
        })
    }

    /// Whether the reference names an explicit registry host
    pub fn is_qualified(&self) -> bool {
        self.host.is_some()
    }

    /// Whether the path has a single component (`busybox`)
    pub fn is_single_segment(&self) -> bool {
        !self.path.contains('/')
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.selector {
            Selector::Tag(tag) => Some(tag),
            Selector::Digest(_) => None,
        }
    }

    pub fn digest(&self) -> Option<&str> {
        match &self.selector {
            Selector::Digest(digest) => Some(digest),
            Selector::Tag(_) => None,
        }
    }

    /// Repository name without selector, as the user wrote it
    pub fn name(&self) -> String {
        match &self.host {
            Some(host) => format!("{}/{}", host, self.path),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.selector)
    }
}

impl FromStr for Reference {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        Reference::parse(s)
    }
}

/// Split off the first component when it looks like a registry hostname
/// (contains a dot or a port, or is literally `localhost`).
fn split_host(name: &str) -> Result<(Option<String>, &str)> {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if let (_, Some(port)) = split_port(first) {
                if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ResolverError::InvalidReference(format!(
                        "invalid registry port in '{}'",
                        first
                    )));
                }
            }
            return Ok((Some(first.to_ascii_lowercase()), rest));
        }
    }
    Ok((None, name))
}

fn validate_tag(tag: &str) -> Result<()> {
    let valid = !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid {
        Ok(())
    } else {
        Err(ResolverError::InvalidReference(format!("invalid tag '{}'", tag)))
    }
}

fn validate_path(path: &str, reference: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ResolverError::InvalidReference(format!(
            "empty repository in reference '{}'",
            reference
        )));
    }
    for component in path.split('/') {
        if !is_valid_component(component) {
            return Err(ResolverError::InvalidReference(format!(
                "invalid repository name '{}' in reference '{}'",
                path, reference
            )));
        }
    }
    Ok(())
}

/// Lowercase alphanumerics joined by `.`, `_`, `__` or runs of `-`
fn is_valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    match (bytes.first(), bytes.last()) {
        (Some(&first), Some(&last)) if is_alnum(first) && is_alnum(last) => {}
        _ => return false,
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_alnum(b) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !is_alnum(bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let ok = separator == "."
            || separator == "_"
            || separator == "__"
            || separator.bytes().all(|c| c == b'-');
        if !ok {
            return false;
        }
    }
    true
}
