//! Resolved endpoints handed to the transfer layer

use crate::image::Selector;
use crate::registry::policy::{OFFICIAL_NAMESPACE, PUBLIC_REGISTRY, split_port};
use serde::Serialize;
use std::fmt;

/// API host serving the public default registry
const PUBLIC_REGISTRY_API: &str = "registry-1.docker.io";

/// Registry index a candidate belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    /// Index name as used in references (`docker.io`, `localhost:5000`)
    pub name: String,
    /// True for the public default registry
    pub official: bool,
    /// Base URL of the registry HTTP API, without the `/v2` suffix
    pub api_base: String,
}

impl IndexInfo {
    pub fn for_host(host: &str) -> Self {
        let official = host == PUBLIC_REGISTRY;
        let api_base = if official {
            format!("https://{}", PUBLIC_REGISTRY_API)
        } else if is_loopback(host) {
            format!("http://{}", host)
        } else {
            format!("https://{}", host)
        };
        Self {
            name: host.to_string(),
            official,
            api_base,
        }
    }
}

fn is_loopback(host: &str) -> bool {
    let (name, _) = split_port(host);
    name == "localhost" || name == "[::1]" || name.starts_with("127.")
}

/// One registry endpoint to attempt, created fresh per resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    pub host: String,
    /// Repository path on this registry, `library/` applied where needed
    pub remote_name: String,
    pub selector: Selector,
    /// Public default host with a `library/` path
    pub is_official_public: bool,
    /// Whether `remote_name` was rewritten from the user's path
    pub normalized: bool,
    pub index: IndexInfo,
}

impl ResolvedEndpoint {
    /// Repository identity used for push serialization
    pub fn identity(&self) -> String {
        format!("{}/{}", self.host, self.remote_name)
    }

    /// Short name for display; official images drop their `library/` prefix
    pub fn local_name(&self) -> &str {
        if self.is_official_public {
            self.remote_name
                .strip_prefix(OFFICIAL_NAMESPACE)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(&self.remote_name)
        } else {
            &self.remote_name
        }
    }

    /// Display name qualified with its registry (`docker.io/hello-world`,
    /// `localhost:5000/library/hello-world`)
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.host, self.local_name())
    }

    /// Canonical remote name including the selector
    pub fn canonical_reference(&self) -> String {
        format!("{}{}", self.identity(), self.selector)
    }

    pub fn manifest_url(&self) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.index.api_base,
            self.remote_name,
            self.selector.as_str()
        )
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str, remote: &str, official: bool) -> ResolvedEndpoint {
        ResolvedEndpoint {
            host: host.to_string(),
            remote_name: remote.to_string(),
            selector: Selector::Tag("latest".to_string()),
            is_official_public: official,
            normalized: false,
            index: IndexInfo::for_host(host),
        }
    }

    #[test]
    fn test_index_api_base() {
        assert_eq!(IndexInfo::for_host("docker.io").api_base, "https://registry-1.docker.io");
        assert_eq!(IndexInfo::for_host("localhost:5000").api_base, "http://localhost:5000");
        assert_eq!(IndexInfo::for_host("127.0.0.1:5000").api_base, "http://127.0.0.1:5000");
        assert_eq!(IndexInfo::for_host("quay.io").api_base, "https://quay.io");
        assert_eq!(IndexInfo::for_host("[::1]:5000").api_base, "http://[::1]:5000");
        assert!(IndexInfo::for_host("docker.io").official);
        assert!(!IndexInfo::for_host("quay.io").official);
    }

    #[test]
    fn test_names() {
        let official = endpoint("docker.io", "library/hello-world", true);
        assert_eq!(official.local_name(), "hello-world");
        assert_eq!(official.qualified_name(), "docker.io/hello-world");
        assert_eq!(official.identity(), "docker.io/library/hello-world");

        let private = endpoint("localhost:5000", "library/hello-world", false);
        assert_eq!(private.local_name(), "library/hello-world");
        assert_eq!(private.qualified_name(), "localhost:5000/library/hello-world");
    }

    #[test]
    fn test_manifest_url() {
        let e = endpoint("localhost:5000", "dockercli/busybox", false);
        assert_eq!(
            e.manifest_url(),
            "http://localhost:5000/v2/dockercli/busybox/manifests/latest"
        );
        assert_eq!(e.to_string(), "localhost:5000/dockercli/busybox:latest");
    }
}
