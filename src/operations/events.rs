//! Progress events reported by the pull and push drivers

use serde::Serialize;
use tokio::sync::mpsc;

/// One step of a pull or push as seen by the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Reference expanded into candidates, in the order they will be tried
    Resolved { reference: String, candidates: Vec<String> },
    /// Transfer attempt against one candidate started
    Trying { candidate: String },
    /// Candidate does not have the image; the pull moves on
    NotFound { candidate: String },
    /// Push lease is held by another push; this one is queued
    Waiting { identity: String, message: String },
    /// Transfer against the candidate succeeded
    Completed { candidate: String },
}

impl ProgressEvent {
    pub fn waiting(identity: &str) -> Self {
        ProgressEvent::Waiting {
            identity: identity.to_string(),
            message: format!("push of {} is already in progress", identity),
        }
    }
}

/// Sending half of the progress channel.
///
/// A sink without a channel, or whose receiver has gone away, discards events;
/// reporting never fails an operation.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a sink together with the receiver that observes it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
