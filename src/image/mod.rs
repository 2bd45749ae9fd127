//! Image reference handling
//!
//! This module turns user-supplied image references into structured
//! [`Reference`] values: optional registry host, repository path and a
//! tag-or-digest [`Selector`]. Digest syntax checks live in [`DigestUtils`].
//!
//! ```
//! use docker_registry_resolver::image::Reference;
//!
//! let r = Reference::parse("localhost:5000/dockercli/busybox:t1").unwrap();
//! assert_eq!(r.host.as_deref(), Some("localhost:5000"));
//! assert_eq!(r.path, "dockercli/busybox");
//! assert_eq!(r.tag(), Some("t1"));
//! ```

pub mod digest;
pub mod reference;

pub use digest::DigestUtils;
pub use reference::{DEFAULT_TAG, Reference, Selector};
