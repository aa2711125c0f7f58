//! Local HTTP proxy that runs every request through the cache controller.
//!
//! The proxy maps each request path onto the configured origin, so pointing a
//! browser at it behaves like visiting the site with the offline cache
//! installed. A path on the origin (a project site such as
//! `https://user.github.io/site/`) is kept as a prefix. Cross-origin
//! precache entries are cached but cannot be addressed through the proxy.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use reqwest::Url;
use serde::Serialize;

use crate::config::ServeConfig;
use crate::controller::CacheController;
use crate::error::{Error, Result};
use crate::http::{Destination, Request, Response};
use crate::network::Fetcher;
use crate::route::FetchOutcome;
use crate::storage::CacheStorage;

/// Path of the proxy's own status endpoint. Never forwarded to the origin.
pub const HEALTH_PATH: &str = "/__folio/health";

struct ProxyState<S: CacheStorage + 'static, F: Fetcher> {
    controller: Arc<CacheController<S, F>>,
    max_body_bytes: usize,
}

impl<S: CacheStorage + 'static, F: Fetcher> Clone for ProxyState<S, F> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: String,
    phase: String,
    controlling: bool,
}

async fn health<S: CacheStorage + 'static, F: Fetcher + 'static>(
    State(state): State<ProxyState<S, F>>,
) -> impl IntoResponse {
    let controller = &state.controller;
    axum::Json(HealthResponse {
        status: "ok",
        store: controller.store_name().to_string(),
        phase: format!("{:?}", controller.phase()),
        controlling: controller.is_controlling(),
    })
}

/// Appends a request path to the origin's own path.
fn origin_url(origin: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = origin.clone();
    let prefix = origin.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{path}"));
    url.set_query(query);
    url.set_fragment(None);
    url
}

/// Rebuilds the incoming request against the origin.
async fn to_request(
    origin: &Url,
    request: axum::extract::Request,
    max_body_bytes: usize,
) -> std::result::Result<Request, StatusCode> {
    let (parts, body) = request.into_parts();

    let url = origin_url(origin, parts.uri.path(), parts.uri.query());

    let destination = parts
        .headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
        .map(Destination::from_fetch_dest)
        .unwrap_or_default();

    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    let mut request = Request::new(parts.method, url)
        .with_destination(destination)
        .with_body(body);
    request.headers = parts.headers;
    Ok(request)
}

fn into_response(response: Response) -> axum::response::Response {
    let mut out = axum::response::Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out
}

async fn proxy<S: CacheStorage + 'static, F: Fetcher + 'static>(
    State(state): State<ProxyState<S, F>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let controller = &state.controller;
    let request = match to_request(controller.origin(), request, state.max_body_bytes).await {
        Ok(request) => request,
        Err(status) => return status.into_response(),
    };

    match controller.handle_fetch(&request).await {
        FetchOutcome::Intercept(Some(response)) => into_response(response),
        FetchOutcome::Intercept(None) => StatusCode::GATEWAY_TIMEOUT.into_response(),
        FetchOutcome::PassThrough => match controller.fetcher().fetch(&request).await {
            Ok(response) => into_response(response),
            Err(e) => {
                log::warn!("Upstream request failed for {}: {e}", request.url);
                StatusCode::BAD_GATEWAY.into_response()
            }
        },
    }
}

/// Builds the proxy router around a shared controller.
pub fn router<S, F>(controller: Arc<CacheController<S, F>>, max_body_bytes: usize) -> Router
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let state = ProxyState {
        controller,
        max_body_bytes,
    };
    Router::new()
        .route(HEALTH_PATH, get(health::<S, F>))
        .fallback(proxy::<S, F>)
        .with_state(state)
}

/// Registers the controller, then serves until the listener fails.
///
/// # Errors
///
/// Returns an error if registration fails or the server cannot bind.
pub async fn run_proxy_server<S, F>(
    controller: Arc<CacheController<S, F>>,
    config: &ServeConfig,
) -> Result<()>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let registration = controller.register().await?;
    if let Some(install) = &registration.install {
        log::info!(
            "Installed {} ({} cached, {} failed)",
            install.store,
            install.cached.len(),
            install.failed.len()
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!(
        "Proxying {} on http://{}",
        controller.origin(),
        listener.local_addr()?
    );

    axum::serve(listener, router(controller, config.max_body_bytes)).await?;
    Ok(())
}
