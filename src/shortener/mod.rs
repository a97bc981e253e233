//! URL shortening through a YOURLS instance.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::constants::USER_AGENT;

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("url to shorten cannot be empty")]
    EmptyUrl,

    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("shortener returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("shortener rejected the request: {message}")]
    Rejected { message: String },

    #[error("failed to decode shortener response: {0}")]
    Decode(String),
}

/// Turns long URLs into short ones.
#[async_trait]
pub trait Shortener: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError>;
}

#[derive(Debug, Deserialize)]
struct ShortenResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    shorturl: String,
}

/// Client for the YOURLS `shorturl` API action.
#[derive(Debug, Clone)]
pub struct YourlsClient {
    http: reqwest::Client,
    endpoint: String,
    signature: String,
    title: String,
}

impl YourlsClient {
    pub fn new(
        endpoint: impl Into<String>,
        signature: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            signature: signature.into(),
            title: title.into(),
        }
    }
}

#[async_trait]
impl Shortener for YourlsClient {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
        if url.is_empty() {
            return Err(ShortenError::EmptyUrl);
        }

        let keyword = uuid::Uuid::new_v4().to_string();
        let form = [
            ("signature", self.signature.as_str()),
            ("action", "shorturl"),
            ("format", "json"),
            ("url", url),
            ("title", self.title.as_str()),
            ("keyword", keyword.as_str()),
        ];

        let resp = self
            .http
            .post(&self.endpoint)
            .header("User-Agent", USER_AGENT)
            .form(&form)
            .send()
            .await
            .map_err(|source| ShortenError::Network {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|source| ShortenError::Network {
            url: self.endpoint.clone(),
            source,
        })?;

        let parsed: ShortenResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ShortenError::HttpStatus {
                    status: status.as_u16(),
                });
            }
            Err(e) => return Err(ShortenError::Decode(e.to_string())),
        };

        if parsed.status != "success" {
            let message = match (parsed.message.is_empty(), &parsed.code) {
                (false, _) => parsed.message,
                (true, Some(code)) => format!("code {code}"),
                (true, None) => format!("status '{}'", parsed.status),
            };
            return Err(ShortenError::Rejected { message });
        }
        if parsed.shorturl.is_empty() {
            return Err(ShortenError::Decode("missing shorturl".to_string()));
        }

        debug!(%keyword, short = %parsed.shorturl, "url shortened");
        Ok(parsed.shorturl)
    }
}
