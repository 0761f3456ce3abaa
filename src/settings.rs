use std::io::ErrorKind;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::FrameConfig;
use crate::error::FrameError;

/// Opaque OAuth credential blob. Only the access and refresh tokens are
/// interpreted; any extra provider fields are carried verbatim so the
/// persisted record round-trips unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
struct Snapshot {
    config: Arc<FrameConfig>,
    token: Option<Arc<OAuthToken>>,
}

/// Explicit configuration/token context shared by every component.
///
/// State is held as an atomically-replaced snapshot: writers swap the whole
/// record under a short write lock, readers always observe either the old or
/// the new value.
#[derive(Clone)]
pub struct SettingsStore {
    state: Arc<RwLock<Snapshot>>,
}

impl SettingsStore {
    /// Builds the store from a validated configuration, loading a previously
    /// persisted token if one exists.
    pub async fn load(config: FrameConfig) -> Result<Self, FrameError> {
        let token = read_token_file(&config).await?;
        if token.is_some() {
            info!(path = %config.token_path.display(), "loaded stored OAuth token");
        }
        Ok(Self {
            state: Arc::new(RwLock::new(Snapshot {
                config: Arc::new(config),
                token: token.map(Arc::new),
            })),
        })
    }

    pub fn config(&self) -> Arc<FrameConfig> {
        self.snapshot().config
    }

    pub fn token(&self) -> Option<Arc<OAuthToken>> {
        self.snapshot().token
    }

    pub fn has_token(&self) -> bool {
        self.snapshot().token.is_some()
    }

    /// Persists the token durably, then makes it visible to readers. The
    /// write must complete before the token is considered valid.
    pub async fn store_token(&self, token: OAuthToken) -> Result<(), FrameError> {
        let path = self.config().token_path.clone();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&token)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "persisted OAuth token");

        let mut state = self.write();
        state.token = Some(Arc::new(token));
        Ok(())
    }

    /// Re-reads the persisted token (e.g. after the external link flow
    /// completed and wrote a fresh one).
    pub async fn reload(&self) -> Result<(), FrameError> {
        let config = self.config();
        let token = read_token_file(&config).await?;
        let mut state = self.write();
        state.token = token.map(Arc::new);
        Ok(())
    }

    /// Applies an administrative configuration change to the in-memory
    /// snapshot. Returns whether the display geometry (width, height, depth
    /// or mode name) changed, in which case the caller must reassert the
    /// video mode.
    pub fn update_config(&self, apply: impl FnOnce(&mut FrameConfig)) -> bool {
        let mut state = self.write();
        let mut next = (*state.config).clone();
        apply(&mut next);
        if next.keywords.is_empty() {
            next.keywords.push(String::new());
        }
        let geometry_changed = next.width != state.config.width
            || next.height != state.config.height
            || next.depth != state.config.depth
            || next.display_mode != state.config.display_mode;
        state.config = Arc::new(next);
        geometry_changed
    }

    fn snapshot(&self) -> Snapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_token_file(config: &FrameConfig) -> Result<Option<OAuthToken>, FrameError> {
    match tokio::fs::read(&config.token_path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
