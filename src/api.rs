use std::sync::Arc;

use tracing::debug;

use crate::resource::{Store, parse_base_url};
use crate::serialize::Serializer;
use crate::session::{Auth, HttpSession, Session};
use crate::{ClientError, Resource};

/// Entry point to a REST API rooted at one base URL.
///
/// ```no_run
/// use slumber::Api;
///
/// let api = Api::new("https://example.com/api/v1/")?;
/// let notes = api.child("notes")?.id(42).get(&[("expand", "author")])?;
/// println!("{:?}", notes.value());
/// # Ok::<(), slumber::ClientError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Api {
    root: Resource,
}

impl Api {
    /// Creates an API with default settings: JSON, trailing slashes, a fresh
    /// HTTP session.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Starts an [`ApiBuilder`] for custom sessions, serializers or auth.
    pub fn builder() -> ApiBuilder {
        ApiBuilder::default()
    }

    /// Resource addressing the base URL itself.
    pub fn root(&self) -> &Resource {
        &self.root
    }

    /// Returns the top-level resource named `name`.
    pub fn child(&self, name: &str) -> Result<Resource, ClientError> {
        self.root.child(name)
    }

    /// Walks a `/`-separated path below the base URL.
    pub fn path(&self, expr: &str) -> Result<Resource, ClientError> {
        self.root.path(expr)
    }

    /// Resolved URL of the root resource.
    pub fn url(&self) -> String {
        self.root.url()
    }
}

/// Builder for [`Api`].
#[derive(Debug)]
pub struct ApiBuilder {
    base_url: Option<String>,
    auth: Option<Auth>,
    format: Option<String>,
    append_slash: bool,
    session: Option<Arc<dyn Session>>,
    serializer: Option<Arc<Serializer>>,
    raw: bool,
}

impl Default for ApiBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            auth: None,
            format: None,
            append_slash: true,
            session: None,
            serializer: None,
            raw: false,
        }
    }
}

impl ApiBuilder {
    /// Absolute URL every resource path is joined onto. Required.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Credentials sent with every request.
    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Format key (`json`, `yaml`, ...) for request bodies and `accept` headers.
    ///
    /// Defaults to the serializer's default key, or `json` when no serializer
    /// is given.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Whether resolved URLs end with `/`. Defaults to `true`.
    #[must_use]
    pub fn append_slash(mut self, append_slash: bool) -> Self {
        self.append_slash = append_slash;
        self
    }

    /// Transport shared by every derived resource. Defaults to [`HttpSession`].
    #[must_use]
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Codec registry shared by every derived resource.
    #[must_use]
    pub fn serializer(mut self, serializer: Arc<Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Makes every verb call return the response alongside the decoded body.
    #[must_use]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Validates the configuration and fills in defaults.
    ///
    /// Fails when the base URL is missing or not absolute, or when the
    /// serializer has no codec for the requested format.
    pub fn build(self) -> Result<Api, ClientError> {
        let raw_url = self
            .base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ClientError::Misconfigured("base_url is required".to_owned()))?;
        let base_url = parse_base_url(&raw_url)?;

        let (format, serializer) = match (self.format, self.serializer) {
            (Some(format), Some(serializer)) => {
                serializer.get_serializer(Some(format.as_str()), None)?;
                (format, serializer)
            }
            (None, Some(serializer)) => (serializer.default_key().to_owned(), serializer),
            (Some(format), None) => {
                let serializer = Serializer::new(format.as_str())?;
                (format, Arc::new(serializer))
            }
            (None, None) => {
                let serializer = Serializer::default();
                (serializer.default_key().to_owned(), Arc::new(serializer))
            }
        };

        let session = self.session.unwrap_or_else(|| {
            debug!("no session supplied, creating an HTTP session");
            Arc::new(HttpSession::new())
        });

        Ok(Api {
            root: Resource::from_store(Store {
                base_url,
                format,
                append_slash: self.append_slash,
                session,
                serializer,
                raw: self.raw,
                auth: self.auth,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::StatusCode;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};
    use serde_json::json;

    use super::Api;
    use crate::serialize::{Codec, JsonCodec, Serializer};
    use crate::session::mock::MockSession;
    use crate::session::{Auth, Response};
    use crate::ClientError;

    const API_URL: &str = "http://example/api/v1";

    fn json_response(body: &str) -> Response {
        Response::new(StatusCode::OK, API_URL)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_content(body)
    }

    fn api_with(session: &Arc<MockSession>, raw: bool) -> Api {
        Api::builder()
            .base_url(API_URL)
            .session(session.clone())
            .raw(raw)
            .build()
            .expect("valid configuration")
    }

    #[test]
    fn missing_base_url_is_misconfigured() {
        let error = Api::builder().build().expect_err("base url required");
        assert!(matches!(error, ClientError::Misconfigured(_)));

        let error = Api::new("  ").expect_err("blank base url");
        assert!(matches!(error, ClientError::Misconfigured(_)));
    }

    #[test]
    fn relative_base_url_is_invalid() {
        let error = Api::new("api/v1").expect_err("not absolute");
        assert!(matches!(error, ClientError::InvalidBaseUrl(ref url) if url == "api/v1"));
    }

    #[test]
    fn api_children_get_decoded_bodies() {
        let session = Arc::new(MockSession::new([json_response(r#"{"result": ["a", "b", "c"]}"#)]));
        let api = api_with(&session, false);

        let outcome = api.child("test").expect("valid name").get(&[]).expect("get");
        assert_eq!(outcome.value(), Some(&json!({"result": ["a", "b", "c"]})));
        assert_eq!(session.last_request().url, "http://example/api/v1/test/");
    }

    #[test]
    fn nested_urls_ignore_trailing_slash_configuration() {
        for append_slash in [true, false] {
            let api = Api::builder()
                .base_url("http://example/api/v1/")
                .append_slash(append_slash)
                .session(Arc::new(MockSession::default()))
                .build()
                .expect("valid configuration");
            let nested = api.child("a").and_then(|a| a.child("b")).expect("valid names");
            let expected = if append_slash {
                "http://example/api/v1/a/b/"
            } else {
                "http://example/api/v1/a/b"
            };
            assert_eq!(nested.url(), expected);
        }
    }

    #[test]
    fn raw_api_makes_every_resource_raw() {
        let session = Arc::new(MockSession::new([Response::new(StatusCode::OK, API_URL)]));
        let api = api_with(&session, true);

        let deep = api.child("myresource").expect("valid").id(1).child("subresource").expect("valid");
        assert!(deep.get(&[]).expect("get").response().is_some());
        assert!(api.child("myresource").expect("valid").id(1).get(&[]).expect("get").response().is_some());
    }

    #[test]
    fn as_raw_only_affects_its_branch() {
        let session = Arc::new(MockSession::new([Response::new(StatusCode::OK, API_URL)]));
        let api = api_with(&session, false);

        let resource = api.path("myresource/1/subresource").expect("valid path");
        assert!(resource.as_raw().get(&[]).expect("get").response().is_some());
        assert!(resource.get(&[]).expect("get").response().is_none());
    }

    #[test]
    fn content_type_only_sent_with_body() {
        let session = Arc::new(MockSession::new([Response::new(StatusCode::CREATED, API_URL)]));
        let api = Api::builder()
            .base_url("http://example/api/v1/")
            .session(session.clone())
            .build()
            .expect("valid configuration");
        let resource = api.child("myresource").expect("valid name");

        resource.post(None, None, &[]).expect("empty post");
        resource.post(Some(json!({"key": "value"})), None, &[]).expect("post");

        let requests = session.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "http://example/api/v1/myresource/");
        assert_eq!(
            requests[0].headers,
            vec![("accept".to_owned(), "application/json".to_owned())]
        );
        assert!(requests[0].data.is_none());
        assert!(requests[0].params.is_empty());
        assert_eq!(
            requests[1].headers,
            vec![
                ("accept".to_owned(), "application/json".to_owned()),
                ("content-type".to_owned(), "application/json".to_owned()),
            ]
        );
        assert_eq!(requests[1].data.as_deref(), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn format_and_serializer_agree() {
        let api = Api::builder()
            .base_url(API_URL)
            .format("yaml")
            .session(Arc::new(MockSession::default()))
            .build()
            .expect("valid configuration");
        assert_eq!(api.root().format(), "yaml");
        assert_eq!(api.root().serializer().default_key(), "yaml");

        let serializer = Arc::new(Serializer::new("yaml").expect("built in"));
        let api = Api::builder()
            .base_url(API_URL)
            .serializer(serializer.clone())
            .session(Arc::new(MockSession::default()))
            .build()
            .expect("valid configuration");
        assert_eq!(api.root().format(), "yaml");
        assert!(Arc::ptr_eq(api.root().serializer(), &serializer));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let error = Api::builder()
            .base_url(API_URL)
            .format("xml")
            .build()
            .expect_err("no xml codec");
        assert!(matches!(error, ClientError::SerializerNotAvailable(_)));
    }

    #[test]
    fn format_missing_from_custom_serializer_is_rejected() {
        let codecs: Vec<Arc<dyn Codec>> = vec![Arc::new(JsonCodec)];
        let json_only = Serializer::with_codecs("json", codecs).expect("json registered");
        let error = Api::builder()
            .base_url(API_URL)
            .format("yaml")
            .serializer(Arc::new(json_only))
            .session(Arc::new(MockSession::default()))
            .build()
            .expect_err("no yaml codec");
        assert!(matches!(error, ClientError::SerializerNotAvailable(ref key) if key == "yaml"));
    }

    #[test]
    fn auth_travels_with_every_request() {
        let session = Arc::new(MockSession::new([json_response("{}")]));
        let api = Api::builder()
            .base_url(API_URL)
            .auth(Auth::Bearer("token".to_owned()))
            .session(session.clone())
            .build()
            .expect("valid configuration");
        api.path("a/b").expect("valid path").get(&[]).expect("get");
        assert_eq!(session.last_request().auth, Some(Auth::Bearer("token".to_owned())));
    }
}
