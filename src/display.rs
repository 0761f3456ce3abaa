use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::FrameConfig;
use crate::settings::SettingsStore;

/// How long the display needs after a mode switch before the framebuffer
/// accepts geometry changes.
const MODE_SETTLE: Duration = Duration::from_secs(1);

/// Known-good depth applied before the target depth; going straight to the
/// target from an unknown prior mode is unreliable.
const BASELINE_DEPTH: u32 = 8;

/// Executes external display commands. Injected so tests can record
/// invocations instead of touching real hardware.
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion and returns its exit code.
    fn run(&self, program: &str, args: &[String]) -> Result<i32>;
    /// Runs a command with stdout redirected to `output`.
    fn run_to_file(&self, program: &str, args: &[String], output: &Path) -> Result<i32>;
}

/// Production runner spawning real subprocesses.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("failed to spawn {program}"))?;
        Ok(status.code().unwrap_or(-1))
    }

    fn run_to_file(&self, program: &str, args: &[String], output: &Path) -> Result<i32> {
        let sink = std::fs::File::create(output)
            .with_context(|| format!("failed to open {}", output.display()))?;
        let status = Command::new(program)
            .args(args)
            .stdout(Stdio::from(sink))
            .status()
            .with_context(|| format!("failed to spawn {program}"))?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[derive(Debug)]
struct DisplayState {
    enabled: bool,
    mode_applied: bool,
}

/// Owns the display power state and serializes every render and power-mode
/// operation behind one mutex so device writes never interleave.
#[derive(Clone)]
pub struct DisplayController {
    settings: SettingsStore,
    runner: Arc<dyn CommandRunner>,
    state: Arc<Mutex<DisplayState>>,
}

impl DisplayController {
    pub fn new(settings: SettingsStore, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            settings,
            runner,
            // The display is powered at boot; main forces the mode right after.
            state: Arc::new(Mutex::new(DisplayState {
                enabled: true,
                mode_applied: false,
            })),
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    pub async fn mode_applied(&self) -> bool {
        self.state.lock().await.mode_applied
    }

    /// Power/mode state machine. Re-applying the current state without
    /// `force` is a no-op issuing zero device commands.
    pub async fn set_enabled(&self, on: bool, force: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if on == state.enabled && !force {
            debug!(on, "display already in requested power state");
            return Ok(());
        }
        let config = self.settings.config();
        let commands = &config.commands;
        if on {
            if force {
                info!(mode = %config.display_mode, "reapplying display mode");
                self.run_checked(
                    &commands.mode_command,
                    &["-e".to_string(), config.display_mode.clone()],
                )?;
                sleep(MODE_SETTLE).await;
                self.run_checked(
                    &commands.framebuffer_command,
                    &["-depth".to_string(), BASELINE_DEPTH.to_string()],
                )?;
                self.run_checked(
                    &commands.framebuffer_command,
                    &[
                        "-depth".to_string(),
                        config.depth.to_string(),
                        "-xres".to_string(),
                        config.width.to_string(),
                        "-yres".to_string(),
                        config.height.to_string(),
                    ],
                )?;
                state.mode_applied = true;
            } else {
                info!("resuming display power");
                self.run_checked(
                    &commands.power_command,
                    &["display_power".to_string(), "1".to_string()],
                )?;
            }
        } else {
            info!("turning display off");
            self.run_checked(
                &commands.power_command,
                &["display_power".to_string(), "0".to_string()],
            )?;
        }
        state.enabled = on;
        Ok(())
    }

    /// Renders a downloaded image to the framebuffer. A non-zero renderer
    /// exit is logged but not an error; spawn failures are.
    pub async fn render_image(&self, path: &Path) -> Result<()> {
        let config = self.settings.config();
        let geometry = format!("{}x{}", config.width, config.height);
        let args = vec![
            path.display().to_string(),
            "-resize".to_string(),
            geometry.clone(),
            "-background".to_string(),
            "black".to_string(),
            "-gravity".to_string(),
            "center".to_string(),
            "-extent".to_string(),
            geometry,
            "-depth".to_string(),
            "8".to_string(),
            "bgra:-".to_string(),
        ];
        self.render(&config, args, "image").await
    }

    /// Renders a status message (link prompt, acquisition error) full-screen.
    pub async fn render_message(&self, text: &str) -> Result<()> {
        let config = self.settings.config();
        let args = vec![
            "-size".to_string(),
            format!("{}x{}", config.width, config.height),
            "-background".to_string(),
            "black".to_string(),
            "-fill".to_string(),
            "white".to_string(),
            "-gravity".to_string(),
            "center".to_string(),
            "-weight".to_string(),
            "700".to_string(),
            "-pointsize".to_string(),
            "64".to_string(),
            format!("label:{text}"),
            "-depth".to_string(),
            "8".to_string(),
            "bgra:-".to_string(),
        ];
        self.render(&config, args, "message").await
    }

    async fn render(&self, config: &FrameConfig, args: Vec<String>, what: &str) -> Result<()> {
        // Same lock as power transitions: one device operation at a time.
        let _guard = self.state.lock().await;
        let code = self.runner.run_to_file(
            &config.commands.renderer_command,
            &args,
            &config.commands.framebuffer_device,
        )?;
        if code != 0 {
            warn!(code, what, "renderer exited with non-zero status");
        }
        Ok(())
    }

    fn run_checked(&self, program: &str, args: &[String]) -> Result<()> {
        let code = self.runner.run(program, args)?;
        ensure!(code == 0, "{program} exited with status {code}");
        Ok(())
    }
}
