use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Local, Timelike};
use rand::Rng;
use rand::rngs::OsRng;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthClient;
use crate::cache::AlbumCache;
use crate::display::DisplayController;
use crate::download;
use crate::error::FrameError;
use crate::picker;
use crate::settings::SettingsStore;
use crate::tasks::clock::in_on_window;

const LINK_MESSAGE: &str =
    "Please link your photo album\n\nOpen the frame's configuration page to sign in";
const NO_IMAGES_MESSAGE: &str =
    "Unable to download any images\nCheck that the album has photos\nand the keywords aren't too strict";

/// Supervisor for the singleton slideshow run.
///
/// At most one run exists system-wide; `start` is an idempotent trigger and
/// every terminal condition (no token, acquisition failure, off-hour) returns
/// the supervisor to idle until the next trigger.
#[derive(Clone)]
pub struct Slideshow {
    inner: Arc<SlideshowInner>,
}

struct SlideshowInner {
    settings: SettingsStore,
    client: AuthClient,
    cache: AlbumCache,
    display: DisplayController,
    cancel: CancellationToken,
    running: AtomicBool,
    current: Mutex<Option<CancellationToken>>,
}

impl Slideshow {
    pub fn new(
        settings: SettingsStore,
        client: AuthClient,
        cache: AlbumCache,
        display: DisplayController,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(SlideshowInner {
                settings,
                client,
                cache,
                display,
                cancel,
                running: AtomicBool::new(false),
                current: Mutex::new(None),
            }),
        }
    }

    /// Starts a slideshow run; returns whether a new run was launched.
    ///
    /// A no-op while a run is active. Without a stored token it renders a
    /// link prompt instead and never enters the running state.
    pub fn start(&self) -> bool {
        if !self.inner.settings.has_token() {
            info!("no OAuth token; prompting for album link instead of starting slideshow");
            let inner = self.inner.clone();
            tokio::spawn(async move {
                if let Err(err) = inner.display.render_message(LINK_MESSAGE).await {
                    warn!(%err, "failed to render link prompt");
                }
            });
            return false;
        }
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("slideshow already running; start request ignored");
            return false;
        }

        let stop = self.inner.cancel.child_token();
        *self
            .inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(stop.clone());

        let inner = self.inner.clone();
        tokio::spawn(async move {
            info!("slideshow started");
            run_loop(&inner, &stop).await;
            inner.running.store(false, Ordering::SeqCst);
            info!("slideshow idle");
        });
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Interrupts the current run, if any, including its inter-image sleep.
    /// The running flag clears once the loop unwinds.
    pub fn stop(&self) {
        let token = self
            .inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}

async fn run_loop(inner: &SlideshowInner, stop: &CancellationToken) {
    loop {
        if stop.is_cancelled() {
            break;
        }
        match show_next(inner).await {
            Ok(()) => {}
            Err(FrameError::NotLinked) => {
                // Token disappeared mid-run (e.g. an external reset).
                report(inner, LINK_MESSAGE).await;
                break;
            }
            Err(err) => {
                warn!(%err, "image acquisition failed; stopping slideshow");
                report(inner, NO_IMAGES_MESSAGE).await;
                break;
            }
        }

        let config = inner.settings.config();
        debug!(
            seconds = config.interval_seconds,
            "sleeping before next image"
        );
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = sleep(Duration::from_secs(config.interval_seconds)) => {}
        }

        let hour = Local::now().hour();
        let config = inner.settings.config();
        if !in_on_window(hour, config.display_on_hour, config.display_off_hour) {
            info!(hour, "after hours; slideshow exiting cleanly");
            break;
        }
    }
}

/// One fetch→pick→download→render iteration.
async fn show_next(inner: &SlideshowInner) -> Result<(), FrameError> {
    let config = inner.settings.config();
    // Keywords are never empty (normalized at load and on every update).
    let keyword = config.keywords[OsRng.gen_range(0..config.keywords.len())].clone();
    debug!(keyword, "selecting next image");

    let listing = inner.cache.get_listing(&keyword).await?;
    info!(count = listing.len(), keyword, "listing loaded");

    let picked =
        picker::pick(&listing, config.width, &mut OsRng).ok_or(FrameError::NoEligibleImage)?;
    info!(mime = %picked.mime, caption = %picked.caption, "picked image");

    let dest = config
        .scratch_dir
        .join(format!("image.{}", picker::extension_for(&picked.mime)));
    download::download(&inner.client, &picked.uri, &dest).await?;

    if let Err(err) = inner.display.render_image(&dest).await {
        // Renderer failures are non-fatal; the next iteration tries again.
        warn!(%err, "renderer failed");
    }
    Ok(())
}

async fn report(inner: &SlideshowInner, message: &str) {
    if let Err(err) = inner.display.render_message(message).await {
        warn!(%err, "failed to render status message");
    }
}
