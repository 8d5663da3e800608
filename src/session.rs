use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};

use crate::ClientError;

/// Transport used by every resource derived from one [`crate::Api`].
///
/// The session is shared by reference between resources and must therefore
/// be safe to call from several threads at once.
pub trait Session: fmt::Debug + Send + Sync {
    /// Sends one fully prepared request and returns the response, whatever its status.
    fn send(&self, request: Request) -> Result<Response, ClientError>;
}

/// Credentials attached to every request made through an API.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`.
    Bearer(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// One file attached to a multipart write request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    field: String,
    file_name: Option<String>,
    mime: Option<String>,
    content: Vec<u8>,
}

impl Upload {
    /// Creates an upload for form field `field` from in-memory bytes.
    pub fn new(field: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            field: field.into(),
            file_name: None,
            mime: None,
            content: content.into(),
        }
    }

    /// Reads `path` from disk; the file name part is taken from the path.
    pub fn from_path(field: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| ClientError::Upload {
            path: path.to_owned(),
            source,
        })?;
        let upload = Self::new(field, content);
        Ok(match path.file_name() {
            Some(name) => upload.with_file_name(name.to_string_lossy()),
            None => upload,
        })
    }

    /// File name reported in the multipart part.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Media type of the part. Left to the transport when unset.
    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Form field name the file is sent under.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// A request as prepared by a resource, before it reaches the transport.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Query string parameters, in call order.
    pub params: Vec<(String, String)>,
    /// Lower-case header names with their values, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Serialized body. Never set together with `files`.
    pub data: Option<String>,
    /// Files for a multipart body.
    pub files: Option<Vec<Upload>>,
    /// Plain form fields sent alongside `files`.
    pub form: Vec<(String, String)>,
    pub auth: Option<Auth>,
}

impl Request {
    /// Returns the value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A received HTTP response with its body fully read.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    content: Vec<u8>,
}

impl Response {
    /// Builds a response by hand, for custom sessions and tests.
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: url.into(),
            content: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns header `name` if present and valid visible ASCII.
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// URL the response was served from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw response body.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Response body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Default [`Session`] backed by a blocking `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct HttpSession {
    http: reqwest::blocking::Client,
}

impl HttpSession {
    /// Creates a session with a default `reqwest` client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a preconfigured client (proxies, timeouts, TLS roots, ...).
    pub fn with_client(http: reqwest::blocking::Client) -> Self {
        Self { http }
    }
}

impl Session for HttpSession {
    fn send(&self, request: Request) -> Result<Response, ClientError> {
        let mut builder = self.http.request(request.method, request.url.as_str());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        builder = match &request.auth {
            Some(Auth::Basic { username, password }) => builder.basic_auth(username, Some(password)),
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };

        if let Some(files) = request.files {
            builder = builder.multipart(multipart_form(request.form, files)?);
        } else if let Some(data) = request.data {
            builder = builder.body(data);
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let content = response.bytes()?.to_vec();

        Ok(Response {
            status,
            headers,
            url,
            content,
        })
    }
}

fn multipart_form(fields: Vec<(String, String)>, files: Vec<Upload>) -> Result<Form, ClientError> {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name, value);
    }
    for upload in files {
        let mut part = Part::bytes(upload.content);
        if let Some(file_name) = upload.file_name {
            part = part.file_name(file_name);
        }
        if let Some(mime) = upload.mime {
            part = part.mime_str(&mime)?;
        }
        form = form.part(upload.field, part);
    }
    Ok(form)
}
