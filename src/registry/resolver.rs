//! Reference resolver
//!
//! Turns a raw reference into the ordered list of registry endpoints to try.
//! Qualified references (explicit host) yield exactly one candidate and never
//! fall back; unqualified references are searched on the public default
//! registry first and then on each additional registry, with blocked hosts
//! skipped. Single-segment names are rewritten to the official `library/`
//! namespace only for the public default candidate.

use crate::error::{ResolverError, Result};
use crate::image::{Reference, Selector};
use crate::registry::endpoint::{IndexInfo, ResolvedEndpoint};
use crate::registry::policy::{OFFICIAL_NAMESPACE, PUBLIC_REGISTRY, RegistryPolicy, normalize_host};
use std::sync::Arc;
use tracing::debug;

/// Where a push goes, after the push-name rules have been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub reference: Reference,
    pub endpoint: ResolvedEndpoint,
}

/// Stateless resolver over a shared policy snapshot
#[derive(Debug, Clone)]
pub struct Resolver {
    policy: Arc<RegistryPolicy>,
}

impl Resolver {
    pub fn new(policy: Arc<RegistryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// Parse and resolve a raw reference into ordered candidates
    pub fn resolve(&self, raw: &str) -> Result<Vec<ResolvedEndpoint>> {
        let reference = Reference::parse(raw)?;
        self.resolve_reference(&reference)
    }

    /// Resolve an already parsed reference into ordered candidates.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::BlockedRegistry`] when the explicit host is blocked
    /// - [`ResolverError::AllRegistriesBlocked`] when no search host is left
    pub fn resolve_reference(&self, reference: &Reference) -> Result<Vec<ResolvedEndpoint>> {
        let candidates = match &reference.host {
            Some(host) => {
                let host = normalize_host(host);
                if self.policy.is_blocked(&host) {
                    debug!(%host, reference = %reference, "explicit registry is blocked");
                    return Err(ResolverError::BlockedRegistry { host });
                }
                vec![endpoint_for(&host, &reference.path, &reference.selector)]
            }
            None => {
                let hosts = self.policy.candidate_hosts();
                if hosts.is_empty() {
                    debug!(reference = %reference, "every candidate registry is blocked");
                    return Err(ResolverError::AllRegistriesBlocked {
                        name: reference.name(),
                    });
                }
                hosts
                    .iter()
                    .map(|host| endpoint_for(host, &reference.path, &reference.selector))
                    .collect()
            }
        };

        debug!(
            reference = %reference,
            candidates = ?candidates.iter().map(|c| c.host.as_str()).collect::<Vec<_>>(),
            "reference resolved"
        );
        Ok(candidates)
    }

    /// Resolve the single registry a push goes to.
    ///
    /// A push never searches: qualified names use their host, unqualified
    /// multi-segment names use the first unblocked candidate. Single-segment
    /// names and official `library/` repositories on the public registry are
    /// refused with [`ResolverError::RootRepositoryPush`].
    pub fn resolve_push(&self, raw: &str) -> Result<PushTarget> {
        let reference = Reference::parse(raw)?;

        if !reference.is_qualified() && reference.is_single_segment() {
            return Err(ResolverError::RootRepositoryPush {
                name: reference.path.clone(),
            });
        }

        let endpoint = self
            .resolve_reference(&reference)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ResolverError::Config(format!("no candidate registry for {}", reference.name()))
            })?;

        if endpoint.is_official_public {
            return Err(ResolverError::RootRepositoryPush {
                name: endpoint.local_name().to_string(),
            });
        }

        Ok(PushTarget {
            reference,
            endpoint,
        })
    }
}

fn endpoint_for(host: &str, path: &str, selector: &Selector) -> ResolvedEndpoint {
    let public = host == PUBLIC_REGISTRY;
    let (remote_name, normalized) = if public && !path.contains('/') {
        (format!("{}/{}", OFFICIAL_NAMESPACE, path), true)
    } else {
        (path.to_string(), false)
    };
    let is_official_public = public
        && remote_name
            .strip_prefix(OFFICIAL_NAMESPACE)
            .is_some_and(|rest| rest.starts_with('/'));

    ResolvedEndpoint {
        host: host.to_string(),
        remote_name,
        selector: selector.clone(),
        is_official_public,
        normalized,
        index: IndexInfo::for_host(host),
    }
}
