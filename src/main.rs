//! Binary entrypoint for the cloud photo frame controller.
//!
//! Wires the settings store, authenticated client, cache, display and the
//! two background loops together; all logic lives in the library crate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use cloud_photo_frame::auth::AuthClient;
use cloud_photo_frame::cache::AlbumCache;
use cloud_photo_frame::display::{DisplayController, ShellRunner};
use cloud_photo_frame::settings::SettingsStore;
use cloud_photo_frame::tasks::slideshow::Slideshow;
use cloud_photo_frame::{Frame, config, tasks};

#[derive(Debug, Parser)]
#[command(name = "cloud-photo-frame", about = "Cloud album photo frame controller")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("cloud_photo_frame={}", level).parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = config::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("invalid configuration values")?;

    let settings = SettingsStore::load(cfg).await.context("loading settings")?;
    if settings.config().oauth.is_none() {
        warn!("no oauth client credentials configured; token refresh is unavailable");
    }

    let client = AuthClient::new(settings.clone()).context("building HTTP client")?;
    let cache = AlbumCache::new(client.clone(), settings.clone());
    let display = DisplayController::new(settings.clone(), Arc::new(ShellRunner));
    let cancel = CancellationToken::new();
    let slideshow = Slideshow::new(
        settings.clone(),
        client,
        cache,
        display.clone(),
        cancel.clone(),
    );
    let frame = Frame {
        settings: settings.clone(),
        display: display.clone(),
        slideshow: slideshow.clone(),
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("SIGTERM received; initiating shutdown");
                    cancel.cancel();
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }

    // Force the display to the configured mode before anything renders.
    frame
        .set_display_enabled(true, true)
        .await
        .context("applying initial display mode")?;

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let settings = settings.clone();
        let display = display.clone();
        let slideshow = slideshow.clone();
        let cancel = cancel.clone();
        async move {
            tasks::clock::run(settings, display, slideshow, cancel)
                .await
                .context("clock task failed")
        }
    });

    if !frame.start_slideshow() {
        info!("slideshow not started; waiting for album link");
    }

    // The HTTP configuration layer would be handed `frame` here.

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(%err, "background task failed; shutting down");
                cancel.cancel();
            }
            Err(err) => {
                warn!(%err, "background task panicked; shutting down");
                cancel.cancel();
            }
        }
    }

    slideshow.stop();
    Ok(())
}
