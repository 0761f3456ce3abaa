use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::auth::AuthClient;
use crate::config::FrameConfig;
use crate::error::FrameError;
use crate::listing::Listing;
use crate::settings::SettingsStore;

/// The provider caps every listing at the first 1000 results.
const MAX_RESULTS: u32 = 1000;

/// Keyword-keyed listing cache with an hours-based TTL.
///
/// One record file per distinct keyword ever queried, named by a content
/// hash of the keyword so the mapping is stable across restarts. Records
/// hold the verbatim response body; they are parsed on every read.
#[derive(Clone)]
pub struct AlbumCache {
    client: AuthClient,
    settings: SettingsStore,
}

/// Stable record file name for a keyword.
pub fn cache_file_name(keyword: &str) -> String {
    let digest = Sha256::digest(keyword.as_bytes());
    let mut name = String::with_capacity(digest.len() * 2 + 5);
    for byte in digest {
        let _ = write!(name, "{byte:02x}");
    }
    name.push_str(".json");
    name
}

/// A record is stale once `floor(age / 3600) >= refresh_hours`.
pub fn is_stale(created: SystemTime, now: SystemTime, refresh_hours: u64) -> bool {
    let age = now.duration_since(created).unwrap_or_default();
    age.as_secs() / 3600 >= refresh_hours
}

impl AlbumCache {
    pub fn new(client: AuthClient, settings: SettingsStore) -> Self {
        Self { client, settings }
    }

    pub async fn get_listing(&self, keyword: &str) -> Result<Listing, FrameError> {
        let config = self.settings.config();
        let path = config.cache_dir.join(cache_file_name(keyword));

        if let Some(bytes) = read_fresh(&path, config.refresh_content_hours).await? {
            match Listing::from_json(&bytes) {
                Ok(listing) => {
                    debug!(keyword, count = listing.len(), "listing served from cache");
                    return Ok(listing);
                }
                Err(err) => {
                    warn!(%err, path = %path.display(), "discarding unreadable cache record");
                }
            }
        }

        match self.fetch(&config, keyword).await {
            Ok(bytes) => {
                write_record(&path, &bytes).await?;
                let listing = Listing::from_json(&bytes)?;
                info!(keyword, count = listing.len(), "listing refreshed");
                Ok(listing)
            }
            Err(err) => {
                // A stale record beats a dark frame; keep serving it until
                // the provider is reachable again.
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    warn!(%err, keyword, "listing refresh failed; serving stale cache record");
                    let bytes = tokio::fs::read(&path).await?;
                    Listing::from_json(&bytes)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn fetch(&self, config: &FrameConfig, keyword: &str) -> Result<Vec<u8>, FrameError> {
        let mut params: Vec<(&str, String)> = vec![
            ("kind", "photo".to_string()),
            ("start-index", "1".to_string()),
            ("max-results", MAX_RESULTS.to_string()),
            ("alt", "json".to_string()),
            ("access", "all".to_string()),
            // Request the largest canonical size; the picker rewrites the
            // URI to the configured display width afterwards.
            ("imgmax", "1600u".to_string()),
            ("fields", "entry(title,content,gphoto:timestamp)".to_string()),
        ];
        if !keyword.is_empty() {
            params.push(("q", keyword.to_string()));
        }
        info!(keyword, "downloading image listing");
        let response = self.client.get(&config.feed_uri, &params).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn read_fresh(path: &Path, refresh_hours: u64) -> Result<Option<Vec<u8>>, FrameError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let created = metadata.modified()?;
    if is_stale(created, SystemTime::now(), refresh_hours) {
        debug!(path = %path.display(), "cache record is stale");
        return Ok(None);
    }
    Ok(Some(tokio::fs::read(path).await?))
}

/// Writes the verbatim listing body via a temp file and an atomic rename so
/// concurrent readers never observe a partial record.
async fn write_record(path: &Path, bytes: &[u8]) -> Result<(), FrameError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
