//! Where module bytes come from

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::{Context, Result};

/// Future returned by [`ModuleSource::fetch`]
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// Fetches module bytes by URL.
///
/// The registry calls `fetch` at most once per URL for as long as the
/// load succeeds.
pub trait ModuleSource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// Reads modules from the local filesystem. Accepts plain paths and `file://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl ModuleSource for FileSource {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))
        })
    }
}

/// Downloads modules over HTTP
#[derive(Debug, Default, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ModuleSource for HttpSource {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Request failed")?
                .error_for_status()
                .context("Server returned an error")?;
            let bytes = response.bytes().await.context("Failed to read body")?;
            Ok(bytes.to_vec())
        })
    }
}

/// Picks HTTP for `http://` and `https://` URLs, the filesystem otherwise
#[derive(Debug, Default, Clone)]
pub struct DefaultSource {
    file: FileSource,
    http: HttpSource,
}

impl ModuleSource for DefaultSource {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.fetch(url)
        } else {
            self.file.fetch(url)
        }
    }
}
