use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Frame configuration, loaded from a kebab-case YAML file. Every field has
/// a default matching the original appliance, so an empty file is a valid
/// configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrameConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Display mode name handed to the mode command (e.g. `DMT 82 DVI`).
    #[serde(default = "default_display_mode")]
    pub display_mode: String,
    /// Minimum delay in seconds between images.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Hour (24h) at which the display goes dark.
    #[serde(default = "default_display_off_hour")]
    pub display_off_hour: u32,
    /// Hour (24h) at which the display wakes and the slideshow restarts.
    #[serde(default = "default_display_on_hour")]
    pub display_on_hour: u32,
    /// Maximum listing age in hours before it is refetched.
    #[serde(default = "default_refresh_content_hours")]
    pub refresh_content_hours: u64,
    /// Search keywords; a blank keyword means "most recent, unfiltered".
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Album feed endpoint.
    #[serde(default = "default_feed_uri")]
    pub feed_uri: String,
    /// Directory holding cached listing records.
    #[serde(default = "default_work_dir")]
    pub cache_dir: PathBuf,
    /// Directory holding the downloaded image between fetch and render.
    #[serde(default = "default_work_dir")]
    pub scratch_dir: PathBuf,
    /// Where the OAuth token is persisted across restarts.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    /// OAuth client credentials; without them token refresh is unavailable.
    #[serde(default)]
    pub oauth: Option<OAuthSettings>,
    #[serde(default)]
    pub commands: DisplayCommands,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_authorization_uri")]
    pub authorization_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// External binaries the display controller drives, plus the framebuffer
/// device the renderer's pixel stream is piped into.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DisplayCommands {
    #[serde(default = "default_mode_command")]
    pub mode_command: String,
    #[serde(default = "default_framebuffer_command")]
    pub framebuffer_command: String,
    #[serde(default = "default_power_command")]
    pub power_command: String,
    #[serde(default = "default_renderer_command")]
    pub renderer_command: String,
    #[serde(default = "default_framebuffer_device")]
    pub framebuffer_device: PathBuf,
}

impl Default for DisplayCommands {
    fn default() -> Self {
        Self {
            mode_command: default_mode_command(),
            framebuffer_command: default_framebuffer_command(),
            power_command: default_power_command(),
            renderer_command: default_renderer_command(),
            framebuffer_device: default_framebuffer_device(),
        }
    }
}

impl FrameConfig {
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            self.width > 0 && self.height > 0,
            "display geometry must be non-zero"
        );
        ensure!(self.depth > 0, "color depth must be non-zero");
        ensure!(
            self.display_off_hour < 24 && self.display_on_hour < 24,
            "display hours must be in 0..24"
        );
        ensure!(
            self.display_on_hour != self.display_off_hour,
            "display-on-hour and display-off-hour must differ"
        );
        ensure!(
            self.interval_seconds >= 1,
            "interval-seconds must be at least 1"
        );
        if self.keywords.is_empty() {
            self.keywords.push(String::new());
        }
        Ok(self)
    }
}

pub fn from_yaml_file(path: &Path) -> Result<FrameConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: FrameConfig =
        serde_yaml::from_str(&text).context("failed to parse configuration YAML")?;
    Ok(cfg)
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_depth() -> u32 {
    32
}

fn default_display_mode() -> String {
    "DMT 82 DVI".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_display_off_hour() -> u32 {
    22
}

fn default_display_on_hour() -> u32 {
    4
}

fn default_refresh_content_hours() -> u64 {
    24
}

fn default_keywords() -> Vec<String> {
    vec![String::new()]
}

fn default_feed_uri() -> String {
    "https://picasaweb.google.com/data/feed/api/user/default".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("/var/lib/cloud-photo-frame/token.json")
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_authorization_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://accounts.google.com/o/oauth2/token".to_string()
}

fn default_mode_command() -> String {
    "/opt/vc/bin/tvservice".to_string()
}

fn default_framebuffer_command() -> String {
    "/bin/fbset".to_string()
}

fn default_power_command() -> String {
    "/usr/bin/vcgencmd".to_string()
}

fn default_renderer_command() -> String {
    "convert".to_string()
}

fn default_framebuffer_device() -> PathBuf {
    PathBuf::from("/dev/fb0")
}
