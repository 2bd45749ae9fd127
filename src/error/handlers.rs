//! Standardized mapping of HTTP responses and network failures onto transfer outcomes

use crate::error::ResolverError;
use crate::registry::transport::TransferOutcome;
use reqwest::StatusCode;

/// Standard error handler for registry HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Classify the status of a manifest lookup.
    ///
    /// `authorized` is true once the request carried a bearer token issued for
    /// the repository. A 401 at that point is the registry refusing to reveal a
    /// repository that does not exist (or is private), which counts as "not
    /// found". A 401 before any token exchange is an authentication failure.
    pub fn handle_manifest_status(
        status: StatusCode,
        authorized: bool,
        operation: &str,
    ) -> TransferOutcome {
        match status.as_u16() {
            200..=299 => TransferOutcome::Found,
            404 => TransferOutcome::NotFound,
            401 if authorized => TransferOutcome::NotFound,
            401 => TransferOutcome::TransportError(format!(
                "Unauthorized to perform {} operation",
                operation
            )),
            403 => TransferOutcome::TransportError(format!(
                "Forbidden: insufficient permissions for {}",
                operation
            )),
            429 => TransferOutcome::TransportError(format!("Rate limited during {}", operation)),
            500 => TransferOutcome::TransportError(format!(
                "Registry server error during {}",
                operation
            )),
            502 | 503 => TransferOutcome::TransportError(format!(
                "Registry unavailable for {}",
                operation
            )),
            _ => TransferOutcome::TransportError(format!(
                "{} failed (status {})",
                operation, status
            )),
        }
    }

    /// Classify the status of a `/v2/` version check
    pub fn handle_ping_status(status: StatusCode) -> TransferOutcome {
        match status.as_u16() {
            // 401 still proves the v2 API is served
            200..=299 | 401 => TransferOutcome::Found,
            _ => TransferOutcome::TransportError(format!(
                "Registry API v2 not available. Status: {}",
                status
            )),
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn describe(error: &reqwest::Error, context: &str) -> String {
        if error.is_timeout() {
            format!("{} timeout: {}", context, error)
        } else if error.is_connect() {
            format!("Connection error during {}: {}", context, error)
        } else if error.to_string().contains("dns") {
            format!("DNS resolution error for {}: {}", context, error)
        } else if error.to_string().contains("certificate") {
            format!("TLS certificate error during {}: {}", context, error)
        } else {
            format!("{} network error: {}", context, error)
        }
    }

    pub fn handle_network_error(error: &reqwest::Error, host: &str, context: &str) -> ResolverError {
        ResolverError::Transport {
            host: host.to_string(),
            message: Self::describe(error, context),
        }
    }
}
