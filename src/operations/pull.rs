//! Pull driver: candidate fallback on "not found" only

use crate::error::{ResolverError, Result};
use crate::operations::events::{EventSink, ProgressEvent};
use crate::registry::{ResolvedEndpoint, Resolver, Transfer, TransferOutcome};
use tracing::{debug, info};

/// Runs a pull across the resolved candidates.
///
/// Pulls never touch the push coordinator and may run fully in parallel.
#[derive(Debug, Clone)]
pub struct PullDriver {
    resolver: Resolver,
}

impl PullDriver {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Pull `raw`, trying candidates strictly in order.
    ///
    /// Returns the candidate that had the image. A "not found" answer moves
    /// on to the next candidate; any transport failure ends the pull at once.
    pub async fn pull(
        &self,
        raw: &str,
        transfer: &dyn Transfer,
        events: &EventSink,
    ) -> Result<ResolvedEndpoint> {
        let candidates = self.resolver.resolve(raw)?;
        events.emit(ProgressEvent::Resolved {
            reference: raw.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        });

        for candidate in &candidates {
            events.emit(ProgressEvent::Trying {
                candidate: candidate.to_string(),
            });

            match transfer.pull(candidate).await {
                TransferOutcome::Found => {
                    info!(candidate = %candidate, "image found");
                    events.emit(ProgressEvent::Completed {
                        candidate: candidate.to_string(),
                    });
                    return Ok(candidate.clone());
                }
                TransferOutcome::NotFound => {
                    debug!(candidate = %candidate, "image not found, trying next registry");
                    events.emit(ProgressEvent::NotFound {
                        candidate: candidate.to_string(),
                    });
                }
                TransferOutcome::Blocked => {
                    return Err(ResolverError::Config(format!(
                        "blocked registry {} reached the transfer stage",
                        candidate.host
                    )));
                }
                TransferOutcome::TransportError(message) => {
                    return Err(ResolverError::Transport {
                        host: candidate.host.clone(),
                        message,
                    });
                }
            }
        }

        let first = candidates.first().ok_or_else(|| {
            ResolverError::Config(format!("no candidate registry for {}", raw))
        })?;
        Err(ResolverError::ImageNotFound {
            name: format!("{}{}", first.remote_name, first.selector),
        })
    }
}
