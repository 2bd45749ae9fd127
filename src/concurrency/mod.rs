//! Concurrency control for registry operations
//!
//! Pushes to the same repository must not overlap. The
//! [`OperationCoordinator`] hands out one [`PushLease`] per repository
//! identity at a time and queues further pushes in arrival order.
//!
//! ## Usage Example
//!
//! ```no_run
//! use docker_registry_resolver::concurrency::OperationCoordinator;
//!
//! # async fn example() {
//! let coordinator = OperationCoordinator::new();
//! let lease = coordinator.acquire("localhost:5000/dockercli/busybox").await;
//! assert!(coordinator.is_in_progress(lease.identity()));
//! drop(lease);
//! # }
//! ```

pub mod coordinator;

pub use coordinator::{CoordinatorStatistics, OperationCoordinator, PushLease, SlotStatus};
