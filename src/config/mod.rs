//! Configuration types for the cache controller, animation and hosts.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Store names are `prefix + version`.
pub const DEFAULT_STORE_PREFIX: &str = "portfolio-cache-";

/// Page served to document requests when the network is unreachable.
pub const DEFAULT_FALLBACK_PAGE: &str = "/index.html";

/// Resources fetched into the store during installation.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/publications.html",
    "/projects.html",
    "/contact.html",
    "/about.html",
    "/assets/css/styles.css",
    "/assets/js/particles.js",
    "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&display=swap",
    "https://cdn.jsdelivr.net/npm/three@0.160.0/build/three.min.js",
];

fn default_store_prefix() -> String {
    DEFAULT_STORE_PREFIX.to_string()
}

fn default_fallback_page() -> String {
    DEFAULT_FALLBACK_PAGE.to_string()
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(ToString::to_string).collect()
}

const fn default_install_concurrency() -> usize {
    4
}

/// Configuration for the offline cache controller.
///
/// Has no `Default`: the version token must be supplied. Changing it is the
/// only way stores from earlier deployments get deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Version token embedded in the store name.
    pub version: String,
    /// Site origin that relative paths resolve against.
    pub origin: String,
    /// Prefix of every store name owned by this site.
    #[serde(default = "default_store_prefix")]
    pub store_prefix: String,
    /// Resources cached during installation.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
    /// Page returned to document requests when offline.
    #[serde(default = "default_fallback_page")]
    pub fallback_page: String,
    /// Number of precache fetches in flight at once.
    #[serde(default = "default_install_concurrency")]
    pub install_concurrency: usize,
}

impl CacheConfig {
    /// Creates a configuration for the given version and origin with the
    /// default precache list.
    #[must_use]
    pub fn new(version: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            origin: origin.into(),
            store_prefix: default_store_prefix(),
            precache: default_precache(),
            fallback_page: default_fallback_page(),
            install_concurrency: default_install_concurrency(),
        }
    }

    /// Replaces the precache list.
    #[must_use]
    pub fn with_precache<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the store name prefix.
    #[must_use]
    pub fn with_store_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.store_prefix = prefix.into();
        self
    }

    /// Sets the offline fallback page.
    #[must_use]
    pub fn with_fallback_page(mut self, page: impl Into<String>) -> Self {
        self.fallback_page = page.into();
        self
    }

    /// Sets the number of concurrent precache fetches.
    #[must_use]
    pub const fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.install_concurrency = concurrency;
        self
    }

    /// Name of the store that is current for this version.
    #[must_use]
    pub fn store_name(&self) -> String {
        format!("{}{}", self.store_prefix, self.version)
    }

    /// Parses the configured origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).map_err(|e| Error::InvalidUrl {
            url: self.origin.clone(),
            reason: e.to_string(),
        })
    }

    /// Resolves a precache entry or path against the origin.
    ///
    /// Absolute URLs (including cross-origin ones) are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin or the entry cannot be parsed.
    pub fn resolve(&self, entry: &str) -> Result<Url> {
        self.origin_url()?.join(entry).map_err(|e| Error::InvalidUrl {
            url: entry.to_string(),
            reason: e.to_string(),
        })
    }

    /// Checks the values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty version or zero concurrency, and
    /// [`Error::InvalidUrl`] for an unusable origin.
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::Config("cache.version must not be empty".to_string()));
        }
        if self.install_concurrency == 0 {
            return Err(Error::Config(
                "cache.install_concurrency must be at least 1".to_string(),
            ));
        }
        let origin = self.origin_url()?;
        if origin.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                url: self.origin.clone(),
                reason: "origin cannot be a base URL".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the particle backdrop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Number of particles, fixed for the lifetime of the animation.
    pub count: usize,
    /// Half-width of the bounding cube.
    pub half_extent: f32,
    /// Per-axis velocities are drawn from `(r - 0.5) * velocity_spread`.
    pub velocity_spread: f32,
    /// Particles closer than this are joined by a line.
    pub link_distance: f32,
    /// Rotation added to both axes every frame.
    pub base_rotation: f32,
    /// Extra rotation per unit of normalized pointer offset.
    pub pointer_rotation: f32,
    /// Initial value of the theme attribute.
    pub theme: String,
    /// Target frame interval in milliseconds.
    pub frame_ms: u64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 100,
            half_extent: 50.0,
            velocity_spread: 0.02,
            link_distance: 15.0,
            base_rotation: 0.001,
            pointer_rotation: 0.001,
            theme: "light".to_string(),
            frame_ms: 16,
        }
    }
}

impl ParticleConfig {
    /// Sets the particle count.
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the initial theme attribute value.
    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }
}

/// Local proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest request body forwarded upstream, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8460,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Filesystem locations used by the binary.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Default location of `config.toml`.
    pub config_path: PathBuf,
    /// Root directory of the on-disk cache stores.
    pub storage_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            config_path: config_dir.join("folio").join("config.toml"),
            storage_dir: cache_dir.join("folio").join("stores"),
        }
    }
}

/// Complete application configuration as stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Offline cache settings.
    pub cache: CacheConfig,
    /// Particle backdrop settings.
    #[serde(default)]
    pub particles: ParticleConfig,
    /// Local proxy settings.
    #[serde(default)]
    pub serve: ServeConfig,
}

const CONFIG_TEMPLATE: &str = r#"# folio configuration

[cache]
# Bump this token on every deployment; stores from other versions are
# deleted when the new version activates.
version = "v5"
origin = "https://example.github.io"
# store_prefix = "portfolio-cache-"
# fallback_page = "/index.html"
# install_concurrency = 4

[particles]
# theme = "light"
# count = 100

[serve]
# host = "127.0.0.1"
# port = 8460
"#;

impl AppConfig {
    /// Creates a configuration around the given cache settings.
    #[must_use]
    pub fn new(cache: CacheConfig) -> Self {
        Self {
            cache,
            particles: ParticleConfig::default(),
            serve: ServeConfig::default(),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, lacks `cache.version`,
    /// or fails validation.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.cache.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Loads the configuration, writing a template first if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be written or the file cannot
    /// be parsed.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, CONFIG_TEMPLATE)?;
            log::info!("Wrote config template to {}", path.display());
        }
        Self::load(path)
    }

    /// Saves the configuration atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml::to_string(self)?)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
