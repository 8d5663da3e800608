//! Codec registry used to encode request bodies and decode response bodies.
//!
//! A [`Serializer`] holds a table of [`Codec`]s keyed both by a short format
//! key (`json`, `yaml`) and by the media types each codec understands. One
//! key is the registry's default; it drives the `accept` header of every
//! request made through a resource using that format.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::ClientError;

/// A body codec for one family of media types.
pub trait Codec: fmt::Debug + Send + Sync {
    /// Short format key, for example `json`.
    fn key(&self) -> &str;

    /// Media types this codec decodes. The first entry is the one it sends.
    fn content_types(&self) -> &[&str];

    /// Media type written to `accept` and `content-type` headers.
    fn content_type(&self) -> &str {
        self.content_types().first().copied().unwrap_or_default()
    }

    /// Serializes a request body.
    fn dumps(&self, data: &Value) -> Result<String, ClientError>;

    /// Deserializes a response body.
    fn loads(&self, data: &[u8]) -> Result<Value, ClientError>;
}

/// JSON codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

const JSON_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/x-javascript",
    "text/javascript",
    "text/x-javascript",
    "text/x-json",
];

impl Codec for JsonCodec {
    fn key(&self) -> &str {
        "json"
    }

    fn content_types(&self) -> &[&str] {
        JSON_CONTENT_TYPES
    }

    fn dumps(&self, data: &Value) -> Result<String, ClientError> {
        to_spaced_json(data)
    }

    fn loads(&self, data: &[u8]) -> Result<Value, ClientError> {
        serde_json::from_slice(data).map_err(|err| ClientError::Decode {
            content_type: self.content_type().to_owned(),
            message: err.to_string(),
        })
    }
}

/// YAML codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn key(&self) -> &str {
        "yaml"
    }

    fn content_types(&self) -> &[&str] {
        &["text/yaml"]
    }

    fn dumps(&self, data: &Value) -> Result<String, ClientError> {
        serde_yaml::to_string(data).map_err(|err| ClientError::Encode(err.to_string()))
    }

    fn loads(&self, data: &[u8]) -> Result<Value, ClientError> {
        serde_yaml::from_slice(data).map_err(|err| ClientError::Decode {
            content_type: self.content_type().to_owned(),
            message: err.to_string(),
        })
    }
}

/// Registry of codecs with one selected default.
#[derive(Clone, Debug)]
pub struct Serializer {
    default: String,
    codecs: Vec<Arc<dyn Codec>>,
}

impl Serializer {
    /// Creates a registry with the built-in JSON and YAML codecs.
    ///
    /// `default` names the codec used when a lookup gives neither a key nor
    /// a content type.
    pub fn new(default: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_codecs(default, vec![Arc::new(JsonCodec), Arc::new(YamlCodec)])
    }

    /// Creates a registry from an explicit codec table.
    pub fn with_codecs(
        default: impl Into<String>,
        codecs: Vec<Arc<dyn Codec>>,
    ) -> Result<Self, ClientError> {
        let default = default.into();
        if !codecs.iter().any(|codec| codec.key() == default) {
            return Err(ClientError::SerializerNotAvailable(default));
        }
        Ok(Self { default, codecs })
    }

    /// Key of the default codec.
    pub fn default_key(&self) -> &str {
        &self.default
    }

    /// Looks up a codec by format key, else by content type, else the default.
    pub fn get_serializer(
        &self,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<&dyn Codec, ClientError> {
        let found = match (name, content_type) {
            (Some(name), _) => self.codecs.iter().find(|codec| codec.key() == name),
            (None, Some(content_type)) => self
                .codecs
                .iter()
                .find(|codec| codec.content_types().contains(&content_type)),
            (None, None) => self.codecs.iter().find(|codec| codec.key() == self.default),
        };

        found.map(|codec| &**codec).ok_or_else(|| {
            ClientError::SerializerNotAvailable(
                name.or(content_type)
                    .unwrap_or(self.default.as_str())
                    .to_owned(),
            )
        })
    }

    /// Media type of the named codec, or of the default codec when `name` is `None`.
    pub fn get_content_type(&self, name: Option<&str>) -> Result<&str, ClientError> {
        Ok(self.get_serializer(name, None)?.content_type())
    }

    /// Serializes with the default codec.
    pub fn dumps(&self, data: &Value) -> Result<String, ClientError> {
        self.get_serializer(None, None)?.dumps(data)
    }

    /// Deserializes with the default codec.
    pub fn loads(&self, data: &[u8]) -> Result<Value, ClientError> {
        self.get_serializer(None, None)?.loads(data)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self {
            default: JsonCodec.key().to_owned(),
            codecs: vec![Arc::new(JsonCodec), Arc::new(YamlCodec)],
        }
    }
}

// Bodies are written with `", "` and `": "` separators.
fn to_spaced_json(data: &Value) -> Result<String, ClientError> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    serde::Serialize::serialize(data, &mut serializer)
        .map_err(|err| ClientError::Encode(err.to_string()))?;
    String::from_utf8(out).map_err(|err| ClientError::Encode(err.to_string()))
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: ?Sized + std::io::Write,
    {
        writer.write_all(b": ")
    }
}
