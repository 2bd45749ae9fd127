//! Bearer token exchange for the registry HTTP API
//!
//! Registries such as Docker Hub answer an unauthenticated request with
//! `401` and a challenge like
//! `Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/busybox:pull"`.
//! The client then asks the realm for a token (anonymously, or with basic
//! credentials) and repeats the request with it.

use crate::error::handlers::NetworkErrorHandler;
use crate::registry::transport::Credentials;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Parsed `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

impl AuthChallenge {
    /// Parse a Bearer challenge; `None` for other schemes or a missing realm
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params_str) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut params = HashMap::new();
        for param in split_params(params_str) {
            if let Some((key, value)) = param.split_once('=') {
                params.insert(
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }

        let realm = params.remove("realm").filter(|r| !r.is_empty())?;
        Some(Self {
            realm,
            service: params.remove("service").unwrap_or_default(),
            scope: params.remove("scope"),
        })
    }

    /// Fetch a token for `default_scope` unless the challenge named its own.
    ///
    /// Failures are reported as a transport message.
    pub async fn fetch_token(
        &self,
        client: &Client,
        credentials: Option<&Credentials>,
        default_scope: &str,
    ) -> Result<String, String> {
        let scope = self.scope.as_deref().unwrap_or(default_scope);
        debug!(realm = %self.realm, service = %self.service, scope, "requesting registry token");

        let mut request = client
            .get(&self.realm)
            .query(&[("service", self.service.as_str()), ("scope", scope)]);
        if let Some(c) = credentials {
            request = request.basic_auth(&c.username, Some(&c.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::describe(&e, "token request"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Token request failed with status: {}", status));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse token response: {}", e))?;
        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "Token response did not contain a token".to_string())
    }
}

/// Split on commas outside quoted values (`scope` may contain commas)
fn split_params(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}
