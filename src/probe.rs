//! Image probing.
//!
//! A candidate URL is speculative until a load attempt confirms it, and the
//! load test is a real decode of the fetched bytes: a candidate that fetches
//! but does not decode is still a miss. Attempts run strictly one at a time
//! per probe sequence, which bounds resource usage when many records resolve
//! their photos at once; distinct probe sequences may still interleave
//! freely with each other.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

/// Why a single load attempt failed. A miss is a normal outcome and never
/// surfaces as an operation error.
#[derive(Debug)]
pub enum LoadFailure {
    /// The bytes could not be fetched at all.
    Fetch(String),
    /// Fetched, but not a decodable image.
    Decode(String),
}

/// The load-test primitive: attempt to fetch and decode one candidate.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), LoadFailure>;
}

/// Loader for http(s) image roots.
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageLoader for HttpLoader {
    async fn load(&self, url: &str) -> Result<(), LoadFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| LoadFailure::Fetch(err.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| LoadFailure::Fetch(err.to_string()))?;
        image::load_from_memory(&bytes).map_err(|err| LoadFailure::Decode(err.to_string()))?;
        Ok(())
    }
}

/// Loader for image roots that are plain directories.
pub struct FileLoader;

#[async_trait]
impl ImageLoader for FileLoader {
    async fn load(&self, url: &str) -> Result<(), LoadFailure> {
        let bytes = std::fs::read(Path::new(url))
            .map_err(|err| LoadFailure::Fetch(err.to_string()))?;
        image::load_from_memory(&bytes).map_err(|err| LoadFailure::Decode(err.to_string()))?;
        Ok(())
    }
}

/// Pick the loader matching the configured image root.
pub fn loader_for_root(root: &str) -> Box<dyn ImageLoader> {
    if root.starts_with("http://") || root.starts_with("https://") {
        Box::new(HttpLoader::new())
    } else {
        Box::new(FileLoader)
    }
}

/// Probe candidates in order, one outstanding attempt at a time, collecting
/// confirmed URLs until `limit` hits or the list is exhausted. Zero hits is
/// a normal result, not an error.
pub async fn probe(loader: &dyn ImageLoader, candidates: &[String], limit: usize) -> Vec<String> {
    let mut hits = Vec::new();
    for candidate in candidates {
        if hits.len() >= limit {
            break;
        }
        match loader.load(candidate).await {
            Ok(()) => {
                debug!(url = %candidate, "candidate confirmed");
                hits.push(candidate.clone());
            }
            Err(failure) => {
                debug!(url = %candidate, ?failure, "candidate miss");
            }
        }
    }
    hits
}
