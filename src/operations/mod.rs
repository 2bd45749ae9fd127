//! Pull and push drivers
//!
//! The drivers tie the resolver, the push coordinator and a [`Transfer`]
//! collaborator together and report progress as [`ProgressEvent`]s.
//!
//! [`Transfer`]: crate::registry::Transfer

pub mod events;
pub mod pull;
pub mod push;

pub use events::{EventSink, ProgressEvent};
pub use pull::PullDriver;
pub use push::{LocalImages, PushDriver, PushReport};
