//! Fetching source files and SRTM tiles.
//!
//! Only available with the `download` feature (on by default).
//!
//! - `http`/`https` URLs go through a blocking `reqwest` client.
//! - `ftp` URLs use an anonymous `suppaftp` session.
//!
//! SRTM tiles are addressed through a URL template. Supported placeholders:
//!
//! - `{filename}` - tile base name (e.g., "N48E002")
//! - `{lat_prefix}` / `{lat}` - "N"/"S" and two latitude digits
//! - `{lon_prefix}` / `{lon}` - "E"/"W" and three longitude digits
//!
//! Tile payloads compressed as `.zip` or `.gz` are unpacked on arrival,
//! detected from the URL extension.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::Url;
use suppaftp::FtpStream;

use crate::archive::extract_from_zip_bytes;
use crate::error::{ElevationError, Result};
use crate::filename::{tile_filename, tile_name};

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Compression format of a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zip,
}

impl Compression {
    /// Detect compression format from a URL or filename.
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".gz") {
            Compression::Gzip
        } else if lower.ends_with(".zip") {
            Compression::Zip
        } else {
            Compression::None
        }
    }
}

/// Transport settings for [`Downloader`].
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of retry attempts on failure.
    pub max_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 3,
        }
    }
}

impl DownloadConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Expand a tile URL template for the tile whose south-west corner is `(x, y)`.
pub fn build_tile_url(template: &str, tile: (i32, i32)) -> Result<String> {
    if template.is_empty() {
        return Err(ElevationError::InvalidConfig(
            "No download URL template configured for tiled source".to_string(),
        ));
    }
    let name = tile_name(tile);
    Ok(template
        .replace("{filename}", &name)
        .replace("{lat_prefix}", &name[0..1])
        .replace("{lat}", &name[1..3])
        .replace("{lon_prefix}", &name[3..4])
        .replace("{lon}", &name[4..7]))
}

/// Blocking downloader shared by every fetch of one session.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ElevationError::DownloadFailed {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `url` to `dest`, byte for byte.
    ///
    /// The body is written next to `dest` first and renamed into place, so a
    /// failed transfer never leaves a truncated file that looks fresh.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let bytes = self.fetch_bytes(url)?;
        write_atomically(dest, &bytes)?;
        tracing::info!(url, dest = %dest.display(), bytes = bytes.len(), "Downloaded");
        Ok(())
    }

    /// Download the SRTM tile `(x, y)` into `dest_dir`, unpacking it if the
    /// template points at a compressed file. Returns the `.hgt` path.
    pub fn fetch_tile(&self, template: &str, tile: (i32, i32), dest_dir: &Path) -> Result<PathBuf> {
        let url = build_tile_url(template, tile)?;
        let dest = dest_dir.join(tile_filename(tile));

        let bytes = self.fetch_bytes(&url)?;
        let payload = match Compression::from_url(&url) {
            Compression::None => bytes,
            Compression::Gzip => {
                let mut decoder = GzDecoder::new(&bytes[..]);
                let mut data = Vec::new();
                decoder
                    .read_to_end(&mut data)
                    .map_err(|e| ElevationError::DownloadFailed {
                        url: url.clone(),
                        reason: format!("Failed to decompress gzip: {}", e),
                    })?;
                data
            }
            Compression::Zip => extract_from_zip_bytes(&bytes, &url)?,
        };

        write_atomically(&dest, &payload)?;
        tracing::info!(url = %url, dest = %dest.display(), "Downloaded tile");
        Ok(dest)
    }

    /// Fetch with retries and linear back-off.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(url, attempt, "Retrying download");
                std::thread::sleep(Duration::from_millis(500 * attempt as u64));
            }

            let result = if url.to_ascii_lowercase().starts_with("ftp://") {
                fetch_ftp(url)
            } else {
                self.fetch_http(url)
            };
            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ElevationError::DownloadFailed {
            url: url.to_string(),
            reason: "Unknown error".to_string(),
        }))
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(ElevationError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}

fn fetch_ftp(url: &str) -> Result<Vec<u8>> {
    let failed = |reason: String| ElevationError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| failed(format!("Invalid URL: {}", e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| failed("URL has no host".to_string()))?;
    let port = parsed.port().unwrap_or(21);

    let mut ftp = FtpStream::connect(format!("{}:{}", host, port))
        .map_err(|e| failed(format!("FTP connect: {}", e)))?;

    let user = if parsed.username().is_empty() {
        "anonymous"
    } else {
        parsed.username()
    };
    let password = parsed.password().unwrap_or("anonymous");
    ftp.login(user, password)
        .map_err(|e| failed(format!("FTP login: {}", e)))?;

    let data = ftp
        .retr_as_buffer(parsed.path())
        .map_err(|e| failed(format!("FTP RETR: {}", e)))?
        .into_inner();

    // The file is already in hand; a failed QUIT is not worth failing over
    let _ = ftp.quit();
    Ok(data)
}

fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes)?;
    fs::rename(&partial, dest)?;
    Ok(())
}
