use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const FAVICON_CONNECT_TIMEOUT_SECS: u64 = 5;
const FAVICON_READ_TIMEOUT_SECS: u64 = 5;
const FAVICON_MAX_REDIRECTS: usize = 8;
const FAVICON_MAX_BYTES: usize = 512 * 1024;
const FAVICON_FILE_EXTENSION: &str = "png";
const FAVICON_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) QRHub/0.1 Mobile Safari/537.36";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("empty response body")]
    Empty,

    #[error("response too large ({0} bytes)")]
    TooLarge(usize),

    #[error("failed to build favicon http client: {0}")]
    Client(reqwest::Error),
}

/// One GET against one candidate URL. Implementations return the body only
/// for a 200 response.
pub trait IconFetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

pub struct HttpIconFetcher {
    client: reqwest::Client,
}

impl HttpIconFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(FAVICON_MAX_REDIRECTS))
            .connect_timeout(Duration::from_secs(FAVICON_CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(FAVICON_READ_TIMEOUT_SECS))
            .user_agent(FAVICON_USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl IconFetcher for HttpIconFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "image/*,*/*;q=0.8")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        if let Some(content_length) = response.content_length() {
            if content_length as usize > FAVICON_MAX_BYTES {
                return Err(FetchError::TooLarge(content_length as usize));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }
        if bytes.len() > FAVICON_MAX_BYTES {
            return Err(FetchError::TooLarge(bytes.len()));
        }
        Ok(bytes.to_vec())
    }
}

pub fn hostname_for(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

/// Fixed priority: favicon proxy, https favicon, http favicon, touch icon.
pub fn favicon_candidates(hostname: &str) -> Vec<Url> {
    [
        format!("https://www.google.com/s2/favicons?domain={}&sz=128", hostname),
        format!("https://{}/favicon.ico", hostname),
        format!("http://{}/favicon.ico", hostname),
        format!("https://{}/apple-touch-icon.png", hostname),
    ]
    .into_iter()
    .filter_map(|candidate| match Url::parse(&candidate) {
        Ok(url) => Some(url),
        Err(err) => {
            log::warn!("skipping malformed favicon candidate {}: {}", candidate, err);
            None
        }
    })
    .collect()
}

pub fn sanitize_hostname(hostname: &str) -> String {
    hostname
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

pub fn favicon_file_path(favicons_dir: &Path, hostname: &str) -> PathBuf {
    favicons_dir.join(format!(
        "{}.{}",
        sanitize_hostname(hostname),
        FAVICON_FILE_EXTENSION
    ))
}

fn store_favicon_bytes(favicons_dir: &Path, hostname: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    fs::create_dir_all(favicons_dir)?;
    let path = favicon_file_path(favicons_dir, hostname);
    fs::write(&path, bytes)?;
    Ok(path)
}

pub fn remove_favicon_file(icon_path: &str) -> Result<bool, String> {
    let trimmed = icon_path.trim();
    if trimmed.is_empty() {
        return Ok(false);
    }
    let path = Path::new(trimmed);
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(path)
        .map_err(|err| format!("failed to remove favicon {}: {}", path.display(), err))?;
    Ok(true)
}

pub struct FaviconResolver<F> {
    fetcher: F,
    favicons_dir: PathBuf,
}

impl<F: IconFetcher> FaviconResolver<F> {
    pub fn new(fetcher: F, favicons_dir: PathBuf) -> Self {
        Self {
            fetcher,
            favicons_dir,
        }
    }

    pub fn favicons_dir(&self) -> &Path {
        &self.favicons_dir
    }

    /// Tries each candidate in order and keeps the first one that downloads
    /// and stores cleanly. Every failure is logged and swallowed.
    pub async fn resolve(&self, url: &str) -> Option<PathBuf> {
        let Some(hostname) = hostname_for(url) else {
            log::warn!("no hostname in scanned url {:?}, skipping favicon", url);
            return None;
        };

        for candidate in favicon_candidates(&hostname) {
            log::debug!("trying favicon candidate {}", candidate);
            let bytes = match self.fetcher.fetch(&candidate).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("favicon candidate failed {}: {}", candidate, err);
                    continue;
                }
            };
            match store_favicon_bytes(&self.favicons_dir, &hostname, &bytes) {
                Ok(path) => {
                    log::info!("favicon for {} stored at {} from {}", hostname, path.display(), candidate);
                    return Some(path);
                }
                Err(err) => {
                    log::warn!("failed to store favicon from {}: {}", candidate, err);
                }
            }
        }

        log::warn!("no favicon source answered for {}", url);
        None
    }
}
