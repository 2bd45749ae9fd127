//! Transfer collaborator seam
//!
//! The resolver and coordinator only decide where an operation goes and when
//! it may start; the bytes are moved by a [`Transfer`] implementation. The
//! bundled [`HttpTransfer`] speaks just enough of the Registry HTTP API v2 to
//! tell whether a candidate has an image (manifest `HEAD`, with a bearer token
//! exchange when challenged) and whether a push target is reachable.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{ResolverError, Result};
use crate::registry::auth::AuthChallenge;
use crate::registry::endpoint::ResolvedEndpoint;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const MANIFEST_MEDIA_TYPES: &[&str] = &[
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.oci.image.index.v1+json",
];

/// What a transfer attempt against one candidate reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Image found (pull) or accepted (push)
    Found,
    /// Candidate does not have the image; a pull moves on to the next one
    NotFound,
    /// Candidate refused by policy; never expected after resolution
    Blocked,
    /// Network or protocol failure; surfaced without trying other candidates
    TransportError(String),
}

/// External collaborator performing the actual registry traffic
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn pull(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome;

    async fn push(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome;
}

/// Basic credentials sent with every request
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct HttpTransferBuilder {
    credentials: Option<Credentials>,
    skip_tls: bool,
    timeout: u64,
}

impl HttpTransferBuilder {
    pub fn new() -> Self {
        Self {
            credentials: None,
            skip_tls: false,
            timeout: 30,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    /// Request timeout in seconds
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpTransfer> {
        if self.timeout == 0 {
            return Err(ResolverError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(self.skip_tls)
            .timeout(Duration::from_secs(self.timeout))
            .user_agent(concat!("docker-registry-resolver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ResolverError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransfer {
            client,
            credentials: self.credentials,
        })
    }
}

impl Default for HttpTransferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry HTTP API v2 client
pub struct HttpTransfer {
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpTransfer {
    pub fn builder() -> HttpTransferBuilder {
        HttpTransferBuilder::new()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn head_manifest(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> std::result::Result<reqwest::Response, TransferOutcome> {
        let request = match bearer {
            Some(token) => self.client.head(url).bearer_auth(token),
            None => self.authorize(self.client.head(url)),
        };
        request
            .header(ACCEPT, MANIFEST_MEDIA_TYPES.join(", "))
            .send()
            .await
            .map_err(|e| {
                TransferOutcome::TransportError(NetworkErrorHandler::describe(&e, "manifest lookup"))
            })
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn pull(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome {
        let url = endpoint.manifest_url();
        debug!(%url, "looking up manifest");

        let response = match self.head_manifest(&url, None).await {
            Ok(response) => response,
            Err(outcome) => return outcome,
        };

        if response.status() != StatusCode::UNAUTHORIZED {
            return HttpErrorHandler::handle_manifest_status(
                response.status(),
                false,
                "manifest lookup",
            );
        }

        // Answer a Bearer challenge with a token for this repository, then retry
        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(AuthChallenge::parse);
        let Some(challenge) = challenge else {
            return HttpErrorHandler::handle_manifest_status(
                response.status(),
                false,
                "manifest lookup",
            );
        };

        let scope = format!("repository:{}:pull", endpoint.remote_name);
        let token = match challenge
            .fetch_token(&self.client, self.credentials.as_ref(), &scope)
            .await
        {
            Ok(token) => token,
            Err(message) => return TransferOutcome::TransportError(message),
        };

        match self.head_manifest(&url, Some(&token)).await {
            Ok(response) => {
                HttpErrorHandler::handle_manifest_status(response.status(), true, "manifest lookup")
            }
            Err(outcome) => outcome,
        }
    }

    async fn push(&self, endpoint: &ResolvedEndpoint) -> TransferOutcome {
        let url = format!("{}/v2/", endpoint.index.api_base);
        debug!(%url, "checking registry API version");

        match self.authorize(self.client.get(&url)).send().await {
            Ok(response) => HttpErrorHandler::handle_ping_status(response.status()),
            Err(e) => {
                TransferOutcome::TransportError(NetworkErrorHandler::describe(&e, "version check"))
            }
        }
    }
}
