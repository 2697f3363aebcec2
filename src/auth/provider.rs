//! Identity provider calls: code exchange and token check
//!
//! The login flow only needs two calls from the provider, so they sit behind
//! the [`IdentityProvider`] trait. [`PangeaAuthn`] is the real implementation
//! against the Pangea AuthN client API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

const USERINFO_PATH: &str = "/v2/client/userinfo";
const TOKEN_CHECK_PATH: &str = "/v2/client/token/check";
const SUCCESS_STATUS: &str = "Success";

/// Failure talking to the identity provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("Provider rejected request ({status}): {summary}")]
    Rejected { status: String, summary: String },

    #[error("Provider response had no {0}")]
    MissingResult(&'static str),
}

/// Outcome of exchanging an authorization code
#[derive(Clone)]
pub struct ExchangeResult {
    /// Active session token
    pub token: String,
    /// Subject identifier of the session owner
    pub identity: String,
    /// Owner of the session, usually the login email
    pub owner: String,
    pub email: String,
    pub expire: Option<DateTime<Utc>>,
}

impl fmt::Debug for ExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeResult")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .field("owner", &self.owner)
            .field("email", &self.email)
            .field("expire", &self.expire)
            .finish()
    }
}

/// Verified identity and session metadata for an active token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenCheck {
    pub id: String,
    #[serde(rename = "type", default)]
    pub token_type: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub life: Option<u64>,
    #[serde(default)]
    pub expire: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// The two provider calls a login flow depends on
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Redeem an authorization code for an active session token
    async fn exchange_code(&self, code: &str) -> Result<ExchangeResult, ProviderError>;

    /// Confirm a session token is currently active
    async fn check_token(&self, token: &str) -> Result<TokenCheck, ProviderError>;
}

// =============================================================================
// PANGEA AUTHN
// =============================================================================

/// Standard Pangea response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    request_id: String,
    status: String,
    #[serde(default)]
    summary: String,
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct UserinfoRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct TokenCheckRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserinfoResult {
    active_token: Option<SessionToken>,
}

#[derive(Debug, Deserialize)]
struct SessionToken {
    token: String,
    #[serde(default)]
    identity: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    expire: Option<DateTime<Utc>>,
}

/// Pangea AuthN client API
pub struct PangeaAuthn {
    client: Client,
    base_url: Url,
    client_token: String,
}

impl PangeaAuthn {
    /// Create a client for `https://authn.<domain>`
    pub fn new(client_token: impl Into<String>, domain: &str) -> Result<Self, ProviderError> {
        let base_url = Url::parse(&format!("https://authn.{}", domain))?;
        Ok(Self::with_base_url(client_token, base_url))
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(client_token: impl Into<String>, base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
            client_token: client_token.into(),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;

        let res = self
            .client
            .post(url)
            .bearer_auth(&self.client_token)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        // Pangea sends the envelope on errors too; fall back to the HTTP
        // status only when the body is not one.
        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                })
            }
            Err(_) => return Err(ProviderError::MissingResult("response envelope")),
        };

        debug!(request_id = %envelope.request_id, status = %envelope.status, "AuthN response");

        if envelope.status != SUCCESS_STATUS {
            return Err(ProviderError::Rejected {
                status: envelope.status,
                summary: envelope.summary,
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        envelope.result.ok_or(ProviderError::MissingResult("result"))
    }
}

#[async_trait]
impl IdentityProvider for PangeaAuthn {
    async fn exchange_code(&self, code: &str) -> Result<ExchangeResult, ProviderError> {
        let result: UserinfoResult = self.post(USERINFO_PATH, &UserinfoRequest { code }).await?;
        let active = result
            .active_token
            .ok_or(ProviderError::MissingResult("active token"))?;

        Ok(ExchangeResult {
            token: active.token,
            identity: active.identity,
            owner: active.owner,
            email: active.email,
            expire: active.expire,
        })
    }

    async fn check_token(&self, token: &str) -> Result<TokenCheck, ProviderError> {
        self.post(TOKEN_CHECK_PATH, &TokenCheckRequest { token }).await
    }
}
