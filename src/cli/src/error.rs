//! Client error types.
//!
//! Non-2xx responses are not errors here: they come back as
//! [`ApiResponse`](crate::remote::ApiResponse) values and land in status
//! cells. `ClientError` covers the failures that leave no response to inspect.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection refused, timeout, TLS)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// A successful response whose body did not have the expected shape
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    pub fn decode(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
