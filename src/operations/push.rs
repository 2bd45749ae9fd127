//! Push driver: push-name rules, local tag checks and per-repository serialization

use crate::concurrency::{OperationCoordinator, PushLease};
use crate::error::{ResolverError, Result};
use crate::image::Selector;
use crate::operations::events::{EventSink, ProgressEvent};
use crate::registry::{ResolvedEndpoint, Resolver, Transfer, TransferOutcome};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Local image store consulted before a push
#[async_trait]
pub trait LocalImages: Send + Sync {
    /// Tags created locally for repository `name` (as the user wrote it), or
    /// `None` when the repository was never tagged
    async fn tags(&self, name: &str) -> Option<Vec<String>>;
}

/// What a completed push did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Target repository; its selector is the last tag pushed
    pub endpoint: ResolvedEndpoint,
    pub tags: Vec<String>,
    /// Whether the push had to queue behind another push of the same repository
    pub waited: bool,
}

/// Runs pushes, one at a time per repository identity
#[derive(Debug, Clone)]
pub struct PushDriver {
    resolver: Resolver,
    coordinator: OperationCoordinator,
}

impl PushDriver {
    pub fn new(resolver: Resolver, coordinator: OperationCoordinator) -> Self {
        Self {
            resolver,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &OperationCoordinator {
        &self.coordinator
    }

    /// Push `raw` after any push of the same repository has finished
    pub async fn push(
        &self,
        raw: &str,
        local_images: &dyn LocalImages,
        transfer: &dyn Transfer,
        events: &EventSink,
    ) -> Result<PushReport> {
        self.push_until(raw, local_images, transfer, events, std::future::pending())
            .await
    }

    /// Like [`push`](Self::push), but gives up with
    /// [`ResolverError::LeaseCancelled`] as soon as `cancel` completes, whether
    /// the push is still queued or already holds the lease. Either way the
    /// lease is released before this returns.
    pub async fn push_until<C>(
        &self,
        raw: &str,
        local_images: &dyn LocalImages,
        transfer: &dyn Transfer,
        events: &EventSink,
        cancel: C,
    ) -> Result<PushReport>
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let target = self.resolver.resolve_push(raw)?;
        let name = target.reference.name();

        let reference = &target.reference;
        let tags = self
            .select_tags(&name, &reference.selector, reference.explicit_selector, local_images)
            .await?;
        let identity = target.endpoint.identity();

        let (lease, waited) = self.lease(&identity, events, cancel.as_mut()).await?;
        let started = Instant::now();

        let mut endpoint = target.endpoint;
        let pushed = tokio::select! {
            biased;
            _ = cancel.as_mut() => {
                warn!(identity = %identity, lease_id = %lease.id, "push cancelled while holding lease");
                Err(ResolverError::LeaseCancelled { identity: identity.clone() })
            }
            result = push_tags(&mut endpoint, &tags, &name, transfer, events) => result,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        drop(lease);
        pushed?;

        info!(
            identity = %identity,
            tags = tags.len(),
            elapsed_ms,
            "push finished"
        );

        Ok(PushReport {
            endpoint,
            tags,
            waited,
        })
    }

    async fn select_tags(
        &self,
        name: &str,
        selector: &Selector,
        explicit: bool,
        local_images: &dyn LocalImages,
    ) -> Result<Vec<String>> {
        let mut local = local_images
            .tags(name)
            .await
            .filter(|tags| !tags.is_empty())
            .ok_or_else(|| ResolverError::RepositoryNotFound {
                name: name.to_string(),
            })?;

        match selector {
            Selector::Digest(_) => Err(ResolverError::InvalidReference(format!(
                "cannot push a digest reference: {}",
                name
            ))),
            Selector::Tag(tag) if explicit => {
                if local.iter().any(|t| t == tag) {
                    Ok(vec![tag.clone()])
                } else {
                    Err(ResolverError::TagNotFound {
                        name: name.to_string(),
                        tag: tag.clone(),
                    })
                }
            }
            // No tag given: every local tag of the repository goes
            Selector::Tag(_) => {
                local.sort();
                local.dedup();
                Ok(local)
            }
        }
    }

    async fn lease<C>(
        &self,
        identity: &str,
        events: &EventSink,
        cancel: C,
    ) -> Result<(PushLease, bool)>
    where
        C: Future<Output = ()>,
    {
        match self.coordinator.try_acquire(identity) {
            Ok(lease) => {
                debug!(identity, lease_id = %lease.id, "push lease acquired");
                Ok((lease, false))
            }
            Err(ResolverError::PushInProgress { .. }) => {
                warn!(identity, "push already in progress, waiting");
                events.emit(ProgressEvent::waiting(identity));
                let lease = self.coordinator.acquire_or_cancel(identity, cancel).await?;
                Ok((lease, true))
            }
            Err(e) => Err(e),
        }
    }
}

async fn push_tags(
    endpoint: &mut ResolvedEndpoint,
    tags: &[String],
    name: &str,
    transfer: &dyn Transfer,
    events: &EventSink,
) -> Result<()> {
    for tag in tags {
        endpoint.selector = Selector::Tag(tag.clone());
        events.emit(ProgressEvent::Trying {
            candidate: endpoint.to_string(),
        });

        match transfer.push(endpoint).await {
            TransferOutcome::Found => {
                events.emit(ProgressEvent::Completed {
                    candidate: endpoint.to_string(),
                });
            }
            TransferOutcome::NotFound => {
                return Err(ResolverError::RepositoryNotFound {
                    name: name.to_string(),
                });
            }
            TransferOutcome::Blocked => {
                return Err(ResolverError::Config(format!(
                    "blocked registry {} reached the transfer stage",
                    endpoint.host
                )));
            }
            TransferOutcome::TransportError(message) => {
                return Err(ResolverError::Transport {
                    host: endpoint.host.clone(),
                    message,
                });
            }
        }
    }
    Ok(())
}
