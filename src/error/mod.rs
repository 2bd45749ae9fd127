//! Error types for reference resolution, registry policy and push coordination

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// Malformed policy at startup, or a blocked candidate reaching the transfer stage
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reference string could not be parsed
    #[error("Invalid reference format: {0}")]
    InvalidReference(String),

    /// The only (explicit) host of a qualified reference is blocked
    #[error("Registry {host} is blocked")]
    BlockedRegistry { host: String },

    /// Every candidate registry of an unqualified reference is blocked
    #[error("All registries are blocked, cannot resolve {name}")]
    AllRegistriesBlocked { name: String },

    /// Repository was never tagged locally (push) or is absent remotely
    #[error("Repository does not exist: {name}")]
    RepositoryNotFound { name: String },

    /// Repository exists but the requested tag was never created
    #[error("Tag {tag} does not exist for {name}")]
    TagNotFound { name: String, tag: String },

    /// Pull exhausted every candidate with "not found"
    #[error("image {name} not found")]
    ImageNotFound { name: String },

    /// Push of an official or single-segment name to the public registry
    #[error(
        "You cannot push a \"root\" repository. Please rename your repository to <user>/<repo> (ex: <user>/{name})"
    )]
    RootRepositoryPush { name: String },

    /// Non-blocking acquire observed a push that still holds the lease
    #[error("push of {identity} is already in progress")]
    PushInProgress { identity: String },

    /// Push was cancelled while waiting for or holding its lease
    #[error("push of {identity} was cancelled")]
    LeaseCancelled { identity: String },

    /// Network/protocol failure against one candidate; never retried elsewhere
    #[error("Transport error talking to {host}: {message}")]
    Transport { host: String, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ResolverError {
    /// Process exit code used by the command line front end
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolverError::Config(_)
            | ResolverError::InvalidReference(_)
            | ResolverError::Io(_)
            | ResolverError::Serialization(_) => 2,
            _ => 1,
        }
    }

    /// Whether the error is a policy decision rather than a failure
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            ResolverError::BlockedRegistry { .. } | ResolverError::AllRegistriesBlocked { .. }
        )
    }
}

impl From<std::io::Error> for ResolverError {
    fn from(err: std::io::Error) -> Self {
        ResolverError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        ResolverError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for ResolverError {
    fn from(err: url::ParseError) -> Self {
        ResolverError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(err: reqwest::Error) -> Self {
        let host = err
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("unknown")
            .to_string();
        handlers::NetworkErrorHandler::handle_network_error(&err, &host, "request")
    }
}
