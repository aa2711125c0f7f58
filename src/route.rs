//! Request classification for the fetch interceptor.

use std::sync::LazyLock;

use regex::Regex;

use crate::http::{Destination, Request, Response};

static IMAGE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|svg|webp|ico)$").expect("valid regex"));

/// How the controller treats a request before touching any store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Leave the request to default network handling.
    Bypass,
    /// Serve from the current store, falling back to the network.
    CacheFirst,
}

/// Result of running a request through the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The interceptor answered. `None` means the network failed and no
    /// fallback applied, so the caller receives no response at all.
    Intercept(Option<Response>),
    /// The interceptor declined; the host fetches normally.
    PassThrough,
}

impl FetchOutcome {
    /// Returns the response if the request was intercepted and answered.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Intercept(Some(response)) => Some(response),
            Self::Intercept(None) | Self::PassThrough => None,
        }
    }

    /// Whether the interceptor declined the request.
    #[must_use]
    pub const fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }
}

/// Whether a URL path names an image file.
#[must_use]
pub fn is_image_path(path: &str) -> bool {
    IMAGE_PATH_RE.is_match(path)
}

/// Whether the request is for an image, by destination or by path suffix.
///
/// Only the path is inspected, so a query string does not hide the extension.
#[must_use]
pub fn is_image_request(request: &Request) -> bool {
    request.destination == Destination::Image || is_image_path(request.url.path())
}

/// Decides how a request is handled.
#[must_use]
pub fn classify(request: &Request) -> Route {
    if is_image_request(request) {
        Route::Bypass
    } else {
        Route::CacheFirst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{StatusCode, Url};

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn image_extensions_bypass() {
        for path in [
            "/img/photo.jpg",
            "/img/photo.jpeg",
            "/a.png",
            "/a.gif",
            "/logo.svg",
            "/a.webp",
            "/favicon.ico",
        ] {
            let request = get(&format!("https://example.org{path}"));
            assert_eq!(classify(&request), Route::Bypass, "{path}");
        }
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(classify(&get("https://example.org/IMG/PHOTO.JPG")), Route::Bypass);
        assert_eq!(classify(&get("https://example.org/a.WebP")), Route::Bypass);
    }

    #[test]
    fn query_string_does_not_hide_extension() {
        assert_eq!(
            classify(&get("https://example.org/photo.png?v=3")),
            Route::Bypass
        );
    }

    #[test]
    fn extension_must_be_a_suffix() {
        assert_eq!(
            classify(&get("https://example.org/photo.png.html")),
            Route::CacheFirst
        );
        assert_eq!(classify(&get("https://example.org/jpg")), Route::CacheFirst);
    }

    #[test]
    fn image_destination_bypasses_regardless_of_path() {
        let request = get("https://example.org/avatar").with_destination(Destination::Image);
        assert_eq!(classify(&request), Route::Bypass);
    }

    #[test]
    fn pages_and_assets_are_cache_first() {
        for url in [
            "https://example.org/",
            "https://example.org/about.html",
            "https://example.org/assets/css/styles.css",
            "https://example.org/assets/js/particles.js",
            "https://cdn.jsdelivr.net/npm/three@0.160.0/build/three.min.js",
        ] {
            assert_eq!(classify(&get(url)), Route::CacheFirst, "{url}");
        }
    }

    #[test]
    fn outcome_accessors() {
        let response = Response::new(StatusCode::OK, "hi");
        let hit = FetchOutcome::Intercept(Some(response.clone()));
        assert_eq!(hit.response(), Some(&response));
        assert!(!hit.is_pass_through());

        assert_eq!(FetchOutcome::Intercept(None).response(), None);
        assert!(FetchOutcome::PassThrough.is_pass_through());
    }
}
