//! Docker Registry Resolver Library
//!
//! Resolves image references against a registry policy of additional and
//! blocked registries, and serializes pushes per repository so two uploads of
//! the same repository never overlap.
//!
//! ```
//! use docker_registry_resolver::{PolicyConfig, RegistryPolicy, Resolver};
//! use std::sync::Arc;
//!
//! let config = PolicyConfig::new(vec!["localhost:5000".to_string()], vec![]);
//! let resolver = Resolver::new(Arc::new(RegistryPolicy::from_config(&config).unwrap()));
//! let candidates = resolver.resolve("dockercli/busybox").unwrap();
//! let hosts: Vec<_> = candidates.iter().map(|c| c.host.as_str()).collect();
//! assert_eq!(hosts, ["docker.io", "localhost:5000"]);
//! ```

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod operations;
pub mod registry;

pub use concurrency::{OperationCoordinator, PushLease};
pub use config::PolicyConfig;
pub use error::{ResolverError, Result};
pub use image::Reference;
pub use logging::Logger;
pub use operations::{EventSink, LocalImages, ProgressEvent, PullDriver, PushDriver};
pub use registry::{RegistryPolicy, ResolvedEndpoint, Resolver, Transfer, TransferOutcome};
