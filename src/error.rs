use std::path::PathBuf;

use thiserror::Error;

use crate::Response;

/// Errors returned by API construction, resource derivation and verb calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required configuration value is missing.
    #[error("improperly configured: {0}")]
    Misconfigured(String),

    /// Base URL is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Attempted to derive a resource from a reserved (underscore-prefixed) name.
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// No codec is registered for the requested format key or content type.
    #[error("serializer not available for '{0}'")]
    SerializerNotAvailable(String),

    /// The server answered `404 Not Found`.
    #[error("client error {}: {}", .response.status(), .response.url())]
    HttpNotFound { response: Box<Response> },

    /// The server answered with any other 4xx status.
    #[error("client error {}: {}", .response.status(), .response.url())]
    HttpClient { response: Box<Response> },

    /// The server answered with a 5xx status.
    #[error("server error {}: {}", .response.status(), .response.url())]
    HttpServer { response: Box<Response> },

    /// A redirect was requested but the response carries no `Location` header.
    #[error("response has no location header to follow")]
    MissingLocation,

    /// HTTP transport-layer request failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Body could not be converted into the requested type.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Request body could not be serialized by the active codec.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// Response body could not be decoded by the codec registered for its content type.
    #[error("failed to decode '{content_type}' response: {message}")]
    Decode {
        content_type: String,
        message: String,
    },

    /// A file attached for upload could not be read.
    #[error("failed to read upload '{}': {source}", .path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Returns the response that triggered an HTTP status error.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::HttpNotFound { response }
            | Self::HttpClient { response }
            | Self::HttpServer { response } => Some(response),
            _ => None,
        }
    }

    /// Returns the raw body of the response that triggered an HTTP status error.
    pub fn content(&self) -> Option<&[u8]> {
        self.response().map(Response::content)
    }

    /// Whether this error was raised for a `404 Not Found` response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpNotFound { .. })
    }
}
