//! Request and response values passed between the controller, storage and network.

use bytes::Bytes;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};

use crate::error::{Error, Result};

/// Semantic resource type of a request (the fetch `destination`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Top-level or nested HTML document.
    Document,
    /// Image element, favicon, CSS background, etc.
    Image,
    /// Script element.
    Script,
    /// Stylesheet.
    Style,
    /// Web font.
    Font,
    /// Programmatic fetch or anything not listed above.
    #[default]
    Empty,
}

impl Destination {
    /// Maps a `Sec-Fetch-Dest` header value onto a destination.
    #[must_use]
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => Self::Document,
            "image" => Self::Image,
            "script" | "worker" | "sharedworker" => Self::Script,
            "style" => Self::Style,
            "font" => Self::Font,
            _ => Self::Empty,
        }
    }

    /// Returns the header spelling of this destination.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Script => "script",
            Self::Style => "style",
            Self::Font => "font",
            Self::Empty => "empty",
        }
    }
}

/// Identity under which a response is stored: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Request method.
    pub method: Method,
    /// Absolute URL, fragment removed.
    pub url: Url,
}

impl RequestKey {
    /// Builds a key, dropping any fragment from the URL.
    #[must_use]
    pub fn new(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method, url }
    }

    /// Key for a `GET` of `url`.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Stable text form used for hashing and listings.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// An outgoing request as seen by the fetch interceptor.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// What the request will be used for.
    pub destination: Destination,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, empty for `GET`.
    pub body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::Empty,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a `GET` request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parses `url` and creates a `GET` request for it.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL.
    pub fn parse_get(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::get(parsed))
    }

    /// Sets the destination.
    #[must_use]
    pub const fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Key under which this request's response would be stored.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), self.url.clone())
    }

    /// Whether the `Accept` header asks for HTML.
    #[must_use]
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("text/html"))
    }
}

/// A complete, buffered response. Cloning is cheap; the body is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}
