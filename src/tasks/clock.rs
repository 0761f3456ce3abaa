use anyhow::Result;
use chrono::{Local, Timelike};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::display::DisplayController;
use crate::settings::SettingsStore;
use crate::tasks::slideshow::Slideshow;

const TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAction {
    TurnOff,
    TurnOn,
}

/// Whether `hour` falls inside the on-window `[on_hour, off_hour)`. The
/// window wraps past midnight when `on_hour > off_hour` (display on
/// overnight).
pub fn in_on_window(hour: u32, on_hour: u32, off_hour: u32) -> bool {
    if on_hour < off_hour {
        hour >= on_hour && hour < off_hour
    } else {
        hour >= on_hour || hour < off_hour
    }
}

/// Day/night power state machine. The display starts enabled at boot; each
/// transition fires exactly once per crossing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockState {
    off: bool,
}

impl ClockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one observed local hour and returns the transition to apply,
    /// if any. Checking only `hour >= on_hour` for the wake would re-wake
    /// at 23:00 when the window is 04-22.
    pub fn observe(&mut self, hour: u32, on_hour: u32, off_hour: u32) -> Option<ClockAction> {
        let in_window = in_on_window(hour, on_hour, off_hour);
        if !self.off && !in_window {
            self.off = true;
            return Some(ClockAction::TurnOff);
        }
        if self.off && in_window {
            self.off = false;
            return Some(ClockAction::TurnOn);
        }
        None
    }
}

/// Runs for the process lifetime on a 60-second tick, driving display power
/// and restarting the slideshow at the on-hour.
pub async fn run(
    settings: SettingsStore,
    display: DisplayController,
    slideshow: Slideshow,
    cancel: CancellationToken,
) -> Result<()> {
    let mut state = ClockState::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting clock task");
                break;
            }
            _ = sleep(TICK) => {}
        }

        let hour = Local::now().hour();
        let config = settings.config();
        debug!(hour, "clock tick");
        match state.observe(hour, config.display_on_hour, config.display_off_hour) {
            Some(ClockAction::TurnOff) => {
                info!(hour, "after hours; turning display off");
                if let Err(err) = display.set_enabled(false, false).await {
                    warn!(%err, "failed to turn display off");
                }
            }
            Some(ClockAction::TurnOn) => {
                info!(hour, "on-hour reached; waking display");
                if let Err(err) = display.set_enabled(true, false).await {
                    warn!(%err, "failed to turn display on");
                }
                slideshow.start();
            }
            None => {}
        }
    }
    Ok(())
}
