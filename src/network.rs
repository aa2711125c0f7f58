//! Network access behind a trait, so the controller can be driven offline in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONNECTION, HOST, HeaderMap, TRANSFER_ENCODING, UPGRADE};
use reqwest::redirect::Policy;

use crate::error::Result;
use crate::http::{Request, Response};

/// Performs a request against the network.
///
/// An `Err` means no response arrived at all (DNS failure, refused
/// connection, timeout). Any HTTP status, including errors, is an `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Sends the request and buffers the full response.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        (**self).fetch(request).await
    }
}

/// Headers that describe a single connection and must not be forwarded.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [CONNECTION, HOST, TRANSFER_ENCODING, UPGRADE] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// Builds the HTTP client used for origin and CDN requests.
///
/// Redirects are not followed so that 3xx responses reach the caller
/// unchanged and are never cached.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
        .redirect(Policy::none())
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = response.bytes().await?;

        log::debug!("{} {} -> {}", request.method, request.url, status);
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
