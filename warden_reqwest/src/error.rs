use reqwest::{header::InvalidHeaderValue, StatusCode};
use thiserror::Error;
use warden_tokens::TokenError;
use warden_traits::{BoxError, MissingConfig};

/// An error raised by a [`CredentialClient`](crate::CredentialClient)
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying HTTP client could not be constructed
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),

    /// Required configuration was missing
    #[error("service token configuration")]
    Config(#[from] MissingConfig),

    /// The request could not be constructed
    #[error("invalid request")]
    InvalidRequest(#[source] reqwest::Error),

    /// A streaming request body could not be read into memory
    #[error("failed to buffer request body")]
    BufferBody(#[source] reqwest::Error),

    /// The request could not be cloned for another attempt
    #[error("request body cannot be replayed")]
    StreamingBody,

    /// A request hook rejected the request
    #[error("request hook failed")]
    RequestHook(#[source] BoxError),

    /// A response hook rejected the response
    #[error("response hook failed")]
    ResponseHook(#[source] BoxError),

    /// No token could be obtained for the request
    #[error("failed to get token")]
    Token(#[from] TokenError),

    /// The token cannot be sent as a header value
    #[error("access token is not a valid header value")]
    InvalidToken(#[source] InvalidHeaderValue),

    /// Every attempt failed
    #[error("request failed after {attempts} attempts")]
    RetriesExhausted {
        /// The number of attempts made
        attempts: u32,
        /// The error of the final failed attempt
        #[source]
        source: Option<BoxError>,
    },

    /// The server answered with a non-success status
    #[error("request failed with status {}: {body}", .status.as_u16())]
    Status {
        /// The response status
        status: StatusCode,
        /// The response body
        body: String,
    },

    /// The response body could not be read
    #[error("failed to read response body")]
    Body(#[source] reqwest::Error),

    /// The response body was not the expected JSON document
    #[error("failed to decode response")]
    Decode(#[source] serde_json::Error),
}

impl ClientError {
    /// The status of a non-success response, if that is what this error is
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
