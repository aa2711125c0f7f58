//! folio - offline cache controller and particle backdrop for a static portfolio site.
//!
//! The cache side installs a versioned store of core pages, deletes stores from
//! earlier versions on activation, and answers requests cache-first with an
//! offline fallback page for navigations. Image requests are never cached.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use folio::{CacheConfig, CacheController, FetchOutcome, HttpFetcher, MemoryStorage, Request};
//!
//! # async fn example() -> folio::Result<()> {
//! let config = CacheConfig::new("v5", "https://example.github.io");
//! let controller = CacheController::new(config, Arc::new(MemoryStorage::new()), HttpFetcher::new()?)?;
//!
//! // Install the precache list (if this version is new) and take control.
//! controller.register().await?;
//!
//! let request = Request::parse_get("https://example.github.io/about.html")?;
//! if let FetchOutcome::Intercept(Some(response)) = controller.handle_fetch(&request).await {
//!     println!("{} ({} bytes)", response.status, response.body.len());
//! }
//!
//! // Let background cache writes finish before exiting.
//! controller.settle().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod network;
pub mod particles;
pub mod route;
pub mod storage;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "serve")]
pub mod serve;
#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use config::{AppConfig, CacheConfig, ParticleConfig, PathConfig, ServeConfig};
pub use controller::{
    ActivationReport, CacheController, CacheEvents, InstallFailure, InstallReport, NoEvents,
    Phase, Registration,
};
pub use error::{Error, Result};
pub use http::{Destination, Request, RequestKey, Response};
pub use network::{Fetcher, HttpFetcher};
pub use route::{FetchOutcome, Route};
pub use storage::{CacheStorage, DiskStorage, MemoryStorage};
