use std::fmt;
use std::sync::{Arc, Mutex};

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde_json::Value;
use tracing::{Span, debug, error, instrument, warn};
use url::Url;

use crate::outcome::{Body, Outcome};
use crate::serialize::Serializer;
use crate::session::{Auth, Request, Response, Session, Upload};
use crate::ClientError;

/// Configuration shared by one resource branch.
///
/// Deriving a resource clones the store and overrides fields on the copy;
/// the session and serializer are shared through their `Arc`s.
#[derive(Clone, Debug)]
pub(crate) struct Store {
    pub(crate) base_url: Url,
    pub(crate) format: String,
    pub(crate) append_slash: bool,
    pub(crate) session: Arc<dyn Session>,
    pub(crate) serializer: Arc<Serializer>,
    pub(crate) raw: bool,
    pub(crate) auth: Option<Auth>,
}

/// Overrides accepted by [`Resource::call`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallArgs {
    id: Option<String>,
    format: Option<String>,
    url_override: Option<Url>,
}

impl CallArgs {
    /// No overrides. Passing this to `call` returns the resource unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` as a path segment.
    #[must_use]
    pub fn id(mut self, id: impl fmt::Display) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Overrides the serialization format for the derived branch.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Replaces the base URL outright. Wins over `id`.
    #[must_use]
    pub fn url_override(mut self, url: Url) -> Self {
        self.url_override = Some(url);
        self
    }

    fn is_empty(&self) -> bool {
        self.id.is_none() && self.format.is_none() && self.url_override.is_none()
    }
}

/// One addressable URL of a REST API.
///
/// Resources are cheap values: [`Resource::child`], [`Resource::call`] and
/// friends return new resources and never modify the one they start from.
#[derive(Debug)]
pub struct Resource {
    store: Store,
    last_response: Mutex<Option<Response>>,
}

impl Clone for Resource {
    fn clone(&self) -> Self {
        Self::from_store(self.store.clone())
    }
}

impl Resource {
    pub(crate) fn from_store(store: Store) -> Self {
        Self {
            store,
            last_response: Mutex::new(None),
        }
    }

    fn derive(&self, apply: impl FnOnce(&mut Store)) -> Self {
        let mut store = self.store.clone();
        apply(&mut store);
        Self::from_store(store)
    }

    /// Returns the child resource named `name`.
    ///
    /// Names beginning with `_` are reserved, and `.`/`..` would walk the
    /// path instead of naming a child. Both fail with
    /// [`ClientError::UnknownAttribute`].
    pub fn child(&self, name: &str) -> Result<Self, ClientError> {
        if name.starts_with('_') || matches!(name, "." | "..") {
            return Err(ClientError::UnknownAttribute(name.to_owned()));
        }
        Ok(self.derive(|store| store.base_url = url_join(&store.base_url, name)))
    }

    /// Walks a `/`-separated path, deriving one child per non-empty segment.
    ///
    /// `resource.path("users/42/posts")` is the same as chaining
    /// `child("users")`, `child("42")` and `child("posts")`.
    pub fn path(&self, expr: &str) -> Result<Self, ClientError> {
        expr.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.clone(), |resource, segment| resource.child(segment))
    }

    /// Re-derives this resource with an id, a format or a new base URL.
    ///
    /// Empty arguments hand back `self` untouched.
    pub fn call(self, args: CallArgs) -> Self {
        if args.is_empty() {
            return self;
        }
        self.derive(|store| {
            if let Some(id) = &args.id {
                store.base_url = url_join(&store.base_url, id);
            }
            if let Some(format) = args.format {
                store.format = format;
            }
            if let Some(url) = args.url_override {
                store.base_url = url;
            }
        })
    }

    /// Shorthand for `call(CallArgs::new().id(id))`.
    pub fn id(&self, id: impl fmt::Display) -> Self {
        self.clone().call(CallArgs::new().id(id))
    }

    /// Shorthand for `call(CallArgs::new().format(format))`.
    pub fn with_format(&self, format: impl Into<String>) -> Self {
        self.clone().call(CallArgs::new().format(format))
    }

    /// Parses `url` and points a copy of this resource at it.
    pub fn with_url(&self, url: &str) -> Result<Self, ClientError> {
        let url = parse_base_url(url)?;
        Ok(self.clone().call(CallArgs::new().url_override(url)))
    }

    /// Returns a copy whose verb calls yield the response with the decoded body.
    #[must_use]
    pub fn as_raw(&self) -> Self {
        self.derive(|store| store.raw = true)
    }

    /// Fully resolved URL, with a trailing slash when the API appends one.
    pub fn url(&self) -> String {
        let mut url = self.store.base_url.clone();
        if self.store.append_slash && !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.into()
    }

    /// Base URL of this branch, without the trailing slash `url()` may add.
    pub fn base_url(&self) -> &Url {
        &self.store.base_url
    }

    /// Serialization format key used by this branch.
    pub fn format(&self) -> &str {
        &self.store.format
    }

    /// Whether verb calls return [`Outcome::Raw`].
    pub fn is_raw(&self) -> bool {
        self.store.raw
    }

    /// Codec registry shared with every resource derived from the same API.
    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.store.serializer
    }

    /// Transport shared with every resource derived from the same API.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.store.session
    }

    /// The last successful response received through this resource.
    pub fn last_response(&self) -> Option<Response> {
        self.last_response
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
    }

    /// Sends a GET with `params` as the query string.
    pub fn get(&self, params: &[(&str, &str)]) -> Result<Outcome, ClientError> {
        self.do_verb_request(Method::GET, None, None, params)
    }

    /// Sends an OPTIONS request, typically to discover allowed actions.
    pub fn options(&self, params: &[(&str, &str)]) -> Result<Outcome, ClientError> {
        self.do_verb_request(Method::OPTIONS, None, None, params)
    }

    /// Sends a HEAD request. The decoded body is usually an empty raw body.
    pub fn head(&self, params: &[(&str, &str)]) -> Result<Outcome, ClientError> {
        self.do_verb_request(Method::HEAD, None, None, params)
    }

    /// Sends `data` encoded with this branch's codec, or a multipart body when
    /// `files` are attached.
    pub fn post(
        &self,
        data: Option<Value>,
        files: Option<Vec<Upload>>,
        params: &[(&str, &str)],
    ) -> Result<Outcome, ClientError> {
        self.do_verb_request(Method::POST, data, files, params)
    }

    /// Partial update. Body handling matches [`Resource::post`].
    pub fn patch(
        &self,
        data: Option<Value>,
        files: Option<Vec<Upload>>,
        params: &[(&str, &str)],
    ) -> Result<Outcome, ClientError> {
        self.do_verb_request(Method::PATCH, data, files, params)
    }

    /// Full replacement. Body handling matches [`Resource::post`].
    pub fn put(
        &self,
        data: Option<Value>,
        files: Option<Vec<Upload>>,
        params: &[(&str, &str)],
    ) -> Result<Outcome, ClientError> {
        self.do_verb_request(Method::PUT, data, files, params)
    }

    /// Returns `true` for any 2xx answer, `false` for other non-error statuses.
    pub fn delete(&self, params: &[(&str, &str)]) -> Result<bool, ClientError> {
        let response = self.request(Method::DELETE, None, None, params)?;
        Ok(response.status().is_success())
    }

    /// Issues a GET against the `Location` header of `response`.
    ///
    /// Verb calls never follow redirects on their own; use this after a write
    /// that answers with a location instead of a representation.
    pub fn follow_location(
        &self,
        response: &Response,
        params: &[(&str, &str)],
    ) -> Result<Outcome, ClientError> {
        let location = response.header(LOCATION).ok_or(ClientError::MissingLocation)?;
        // Relative locations resolve against the URL the request went to.
        let target = Url::parse(&self.url())
            .and_then(|request_url| request_url.join(location))
            .map_err(|_| ClientError::InvalidBaseUrl(location.to_owned()))?;
        self.clone()
            .call(CallArgs::new().url_override(target))
            .get(params)
    }

    fn do_verb_request(
        &self,
        method: Method,
        data: Option<Value>,
        files: Option<Vec<Upload>>,
        params: &[(&str, &str)],
    ) -> Result<Outcome, ClientError> {
        let response = self.request(method, data, files, params)?;
        self.process_response(response)
    }

    #[instrument(
        name = "http_request",
        skip_all,
        fields(
            http.method = %method,
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
        )
    )]
    fn request(
        &self,
        method: Method,
        data: Option<Value>,
        files: Option<Vec<Upload>>,
        params: &[(&str, &str)],
    ) -> Result<Response, ClientError> {
        let codec = self
            .store
            .serializer
            .get_serializer(Some(self.store.format.as_str()), None)?;
        let url = self.url();
        Span::current().record("http.url", url.as_str());

        let mut headers = vec![("accept".to_owned(), codec.content_type().to_owned())];
        let files = files.filter(|files| !files.is_empty());

        let (body, form) = match (data, files.is_some()) {
            (Some(data), false) => {
                headers.push(("content-type".to_owned(), codec.content_type().to_owned()));
                (Some(codec.dumps(&data)?), Vec::new())
            }
            (Some(data), true) => (None, form_fields(data)),
            (None, _) => (None, Vec::new()),
        };

        let request = Request {
            method,
            url: url.clone(),
            params: params
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
            headers,
            data: body,
            files,
            form,
            auth: self.store.auth.clone(),
        };

        let response = self.store.session.send(request)?;
        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());
        debug!(status = status.as_u16(), "response received");

        match status.as_u16() {
            400..=499 => {
                warn!(status = status.as_u16(), %url, "client error");
                let response = Box::new(response);
                if status.as_u16() == 404 {
                    Err(ClientError::HttpNotFound { response })
                } else {
                    Err(ClientError::HttpClient { response })
                }
            }
            500..=599 => {
                error!(status = status.as_u16(), %url, "server error");
                Err(ClientError::HttpServer {
                    response: Box::new(response),
                })
            }
            _ => {
                if let Ok(mut slot) = self.last_response.lock() {
                    *slot = Some(response.clone());
                }
                Ok(response)
            }
        }
    }

    fn process_response(&self, response: Response) -> Result<Outcome, ClientError> {
        let decoded = if response.status().is_success() {
            self.try_to_serialize_response(&response)?
        } else {
            None
        };

        if self.store.raw {
            Ok(Outcome::Raw { response, decoded })
        } else {
            Ok(Outcome::Decoded(decoded))
        }
    }

    fn try_to_serialize_response(&self, response: &Response) -> Result<Option<Body>, ClientError> {
        if matches!(response.status().as_u16(), 204 | 205) {
            return Ok(None);
        }

        let content = response.content();
        let content_type = response
            .header(CONTENT_TYPE)
            .map(|value| value.split(';').next().unwrap_or_default().trim())
            .filter(|value| !value.is_empty());

        let Some(content_type) = content_type.filter(|_| !content.is_empty()) else {
            return Ok(Some(Body::Raw(content.to_vec())));
        };

        match self.store.serializer.get_serializer(None, Some(content_type)) {
            Ok(codec) => Ok(Some(Body::Value(codec.loads(content)?))),
            Err(ClientError::SerializerNotAvailable(_)) => {
                debug!(content_type, "no codec registered, returning raw body");
                Ok(Some(Body::Raw(content.to_vec())))
            }
            Err(other) => Err(other),
        }
    }
}

/// Appends `segment` to the path of `base`, keeping exactly one `/` between them.
///
/// Query string and fragment of `base` are preserved.
pub(crate) fn url_join(base: &Url, segment: &str) -> Url {
    let segment = segment.trim_start_matches('/');
    let mut joined = base.clone();
    if segment.is_empty() {
        return joined;
    }
    let path = format!("{}/{segment}", base.path().trim_end_matches('/'));
    joined.set_path(&path);
    joined
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    Url::parse(raw)
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .ok_or_else(|| ClientError::InvalidBaseUrl(raw.to_owned()))
}

// Multipart bodies carry the top-level fields of an object payload as text.
fn form_fields(data: Value) -> Vec<(String, String)> {
    match data {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect(),
        other => {
            debug!(?other, "non-object payload dropped from multipart body");
            Vec::new()
        }
    }
}
