use crate::error::{Error, Result};
use reqwest::Url;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetches remote assets into a local cache directory.
///
/// Files are cached as `<stem>.<ext>` taken from the last URL path segment, so two
/// URLs ending in the same file name share one cache entry. Downloads are blocking
/// and sequential; no timeout is applied.
///
/// # Example
/// ```ignore
/// let downloader = Downloader::new(".projects/cache")?;
/// let local = downloader.download("https://host/data/cat_01.jpg")?;
/// ```
pub struct Downloader {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl Downloader {
    /// Creates the cache directory if needed.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| Error::io(&cache_dir, e))?;
        Ok(Self {
            cache_dir,
            client: reqwest::blocking::Client::new(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether a cell value should go through the downloader.
    pub fn is_url(value: &str) -> bool {
        Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
    }

    /// Local path a URL is cached under.
    pub fn cache_path(&self, url: &str) -> Result<PathBuf> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::format(url, format!("invalid url: {e}")))?;
        let file_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::format(url, "url has no file name"))?;
        Ok(self.cache_dir.join(file_name))
    }

    /// Returns the cached copy of `url`, fetching it first when absent.
    pub fn download(&self, url: &str) -> Result<PathBuf> {
        let target = self.cache_path(url)?;
        if target.exists() {
            debug!(url, path = %target.display(), "Cache hit");
            return Ok(target);
        }

        let to_download_error = |source| Error::Download {
            url: url.to_string(),
            source,
        };
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(to_download_error)?;
        fs::write(&target, &bytes).map_err(|e| Error::io(&target, e))?;
        debug!(url, path = %target.display(), size = bytes.len(), "Downloaded");
        Ok(target)
    }
}
