//! Registry module for reference resolution
//!
//! This module decides which registries a reference may be pulled from or
//! pushed to. It holds the operator policy (additional and blocked
//! registries), the resolver that expands references into ordered
//! candidates, and the transfer seam that reports what each candidate has.

pub mod auth;
pub mod endpoint;
pub mod policy;
pub mod resolver;
pub mod transport;

pub use endpoint::{IndexInfo, ResolvedEndpoint};
pub use policy::{PUBLIC_REGISTRY, PolicySummary, RegistryPolicy, is_public_registry, normalize_host};
pub use resolver::{PushTarget, Resolver};
pub use transport::{Credentials, HttpTransfer, HttpTransferBuilder, Transfer, TransferOutcome};
