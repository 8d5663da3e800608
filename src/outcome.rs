use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClientError, Response};

/// A successfully read response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Decoded by the codec registered for the response content type.
    Value(Value),
    /// Returned unchanged: no content type, an empty body or no matching codec.
    Raw(Vec<u8>),
}

impl Body {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Value(_) => None,
        }
    }

    /// Converts the body into a typed value.
    ///
    /// Raw bodies are parsed as JSON.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        match self {
            Self::Value(value) => Ok(T::deserialize(value)?),
            Self::Raw(bytes) => Ok(serde_json::from_slice(bytes)?),
        }
    }
}

/// Result of a verb call.
///
/// Resources in raw mode return [`Outcome::Raw`]; all others return
/// [`Outcome::Decoded`]. The decoded body is `None` for 204/205 answers and
/// for non-2xx statuses that are not errors.
#[derive(Clone, Debug)]
pub enum Outcome {
    Decoded(Option<Body>),
    Raw {
        response: Response,
        decoded: Option<Body>,
    },
}

impl Outcome {
    pub fn decoded(&self) -> Option<&Body> {
        match self {
            Self::Decoded(decoded) | Self::Raw { decoded, .. } => decoded.as_ref(),
        }
    }

    /// Shorthand for the decoded body when a codec produced a value.
    pub fn value(&self) -> Option<&Value> {
        self.decoded().and_then(Body::as_value)
    }

    /// The response, when the resource was in raw mode.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Raw { response, .. } => Some(response),
            Self::Decoded(_) => None,
        }
    }

    pub fn into_decoded(self) -> Option<Body> {
        self.into_parts().1
    }

    pub fn into_parts(self) -> (Option<Response>, Option<Body>) {
        match self {
            Self::Decoded(decoded) => (None, decoded),
            Self::Raw { response, decoded } => (Some(response), decoded),
        }
    }
}
