//! Cache stores persisted under a directory, one subdirectory per store.
//!
//! Each entry is one `<sha256>.entry` file: a line of JSON metadata followed
//! by the raw body. A write lands with a single rename, so a reader sees
//! either the previous entry or the new one, never a mix, and concurrent
//! writes to the same key leave the last rename in place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::http::{RequestKey, Response};

use super::{CacheStorage, ensure_cacheable};

const ENTRY_EXTENSION: &str = "entry";

/// Metadata stored ahead of each response body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, Vec<u8>)>,
    stored_at: DateTime<Utc>,
}

impl EntryMeta {
    fn new(key: &RequestKey, response: &Response) -> Self {
        Self {
            method: key.method.to_string(),
            url: key.url.to_string(),
            status: response.status.as_u16(),
            headers: response
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
            stored_at: Utc::now(),
        }
    }

    fn key(&self) -> Result<RequestKey> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|e| Error::Storage(format!("bad method {:?}: {e}", self.method)))?;
        let url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(RequestKey::new(method, url))
    }

    fn into_response(self, body: Bytes) -> Result<Response> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| Error::Storage(format!("bad status {}: {e}", self.status)))?;
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Storage(format!("bad header name {name:?}: {e}")))?;
            let value = HeaderValue::from_bytes(&value)
                .map_err(|e| Error::Storage(format!("bad header value: {e}")))?;
            headers.append(name, value);
        }
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Serializes an entry as its metadata line followed by the body.
fn encode_entry(meta: &EntryMeta, body: &[u8]) -> Result<Vec<u8>> {
    let mut contents = serde_json::to_vec(meta)?;
    contents.reserve(body.len() + 1);
    contents.push(b'\n');
    contents.extend_from_slice(body);
    Ok(contents)
}

/// Splits an entry file into its metadata and body.
fn decode_entry(contents: Vec<u8>) -> Result<(EntryMeta, Bytes)> {
    let mut contents = Bytes::from(contents);
    let split = contents
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| Error::Storage("entry has no metadata line".to_string()))?;
    let meta = contents.split_to(split + 1);
    let meta = serde_json::from_slice(&meta[..split])?;
    Ok((meta, contents))
}

/// Cache storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of all stores.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> Result<PathBuf> {
        validate_store_name(store)?;
        Ok(self.root.join(store))
    }

    fn entry_path(&self, store: &str, key: &RequestKey) -> Result<PathBuf> {
        let dir = self.store_dir(store)?;
        Ok(dir.join(format!("{}.{ENTRY_EXTENSION}", entry_hash(key))))
    }
}

/// Store names become directory names, so they are restricted to a safe set.
fn validate_store_name(store: &str) -> Result<()> {
    let valid = !store.is_empty()
        && !store.starts_with('.')
        && store
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::Storage(format!("invalid store name {store:?}")))
    }
}

fn entry_hash(key: &RequestKey) -> String {
    format!("{:x}", Sha256::digest(key.canonical().as_bytes()))
}

/// Writes `contents` to `path` via a uniquely named temp file and a rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
    tokio::fs::write(&tmp_path, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

async fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, store: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.store_dir(store)?).await?;
        Ok(())
    }

    async fn has(&self, store: &str) -> Result<bool> {
        Ok(tokio::fs::metadata(self.store_dir(store)?)
            .await
            .is_ok_and(|m| m.is_dir()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_store_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, store: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.store_dir(store)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, store: &str, key: &RequestKey) -> Result<Option<Response>> {
        let Some(contents) = read_optional(&self.entry_path(store, key)?).await? else {
            return Ok(None);
        };
        let (meta, body) = decode_entry(contents)?;
        meta.into_response(body).map(Some)
    }

    async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
        ensure_cacheable(key)?;
        self.open(store).await?;

        let contents = encode_entry(&EntryMeta::new(key, response), &response.body)?;
        write_atomic(&self.entry_path(store, key)?, &contents).await?;
        Ok(())
    }

    async fn entries(&self, store: &str) -> Result<Vec<RequestKey>> {
        let dir = self.store_dir(store)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                let (meta, _) = decode_entry(tokio::fs::read(&path).await?)?;
                keys.push(meta.key()?);
            }
        }
        keys.sort_by_key(RequestKey::canonical);
        Ok(keys)
    }
}
