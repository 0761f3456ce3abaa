pub mod auth;
pub mod cache;
pub mod config;
pub mod display;
pub mod download;
pub mod error;
pub mod listing;
pub mod picker;
pub mod settings;
pub mod tasks {
    pub mod clock;
    pub mod slideshow;
}

use anyhow::Result;

/// Control surface handed to the (external) HTTP configuration layer.
#[derive(Clone)]
pub struct Frame {
    pub settings: settings::SettingsStore,
    pub display: display::DisplayController,
    pub slideshow: tasks::slideshow::Slideshow,
}

impl Frame {
    /// Idempotent slideshow trigger; returns whether a new run was launched.
    pub fn start_slideshow(&self) -> bool {
        self.slideshow.start()
    }

    pub async fn is_display_enabled(&self) -> bool {
        self.display.is_enabled().await
    }

    pub async fn set_display_enabled(&self, on: bool, force: bool) -> Result<()> {
        self.display.set_enabled(on, force).await
    }

    /// Applies an administrative configuration change. Reasserts the video
    /// mode whenever the change touched width, height, depth or the display
    /// mode name.
    pub async fn update_config(
        &self,
        apply: impl FnOnce(&mut config::FrameConfig),
    ) -> Result<()> {
        if self.settings.update_config(apply) {
            self.display.set_enabled(true, true).await?;
        }
        Ok(())
    }
}
