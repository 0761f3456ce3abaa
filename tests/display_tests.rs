mod support;

use std::path::Path;
use std::sync::Arc;

use cloud_photo_frame::display::DisplayController;
use cloud_photo_frame::settings::SettingsStore;

use support::{RecordingRunner, default_config};

async fn controller_with(runner: RecordingRunner) -> (DisplayController, Arc<RecordingRunner>) {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = default_config();
    cfg.token_path = dir.path().join("token.json");
    let settings = SettingsStore::load(cfg).await.unwrap();
    let runner = Arc::new(runner);
    (
        DisplayController::new(settings, runner.clone()),
        runner,
    )
}

async fn controller() -> (DisplayController, Arc<RecordingRunner>) {
    controller_with(RecordingRunner::default()).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn enabling_an_already_on_display_issues_no_commands() {
    let (display, runner) = controller().await;
    assert!(display.is_enabled().await);
    display.set_enabled(true, false).await.unwrap();
    assert!(runner.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn power_off_and_resume_use_the_power_command() {
    let (display, runner) = controller().await;

    display.set_enabled(false, false).await.unwrap();
    assert!(!display.is_enabled().await);

    // Off again is idempotent.
    display.set_enabled(false, false).await.unwrap();

    display.set_enabled(true, false).await.unwrap();
    assert!(display.is_enabled().await);

    let calls = runner.calls();
    assert_eq!(
        calls,
        vec![
            "/usr/bin/vcgencmd display_power 0".to_string(),
            "/usr/bin/vcgencmd display_power 1".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn forced_enable_reasserts_mode_and_applies_depth_in_two_steps() {
    let (display, runner) = controller().await;

    display.set_enabled(true, true).await.unwrap();
    assert!(display.mode_applied().await);

    let calls = runner.calls();
    assert_eq!(
        calls,
        vec![
            "/opt/vc/bin/tvservice -e DMT 82 DVI".to_string(),
            "/bin/fbset -depth 8".to_string(),
            "/bin/fbset -depth 32 -xres 1920 -yres 1080".to_string(),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn render_message_pipes_renderer_output_to_the_framebuffer() {
    let (display, runner) = controller().await;

    display.render_message("hello\nthere").await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("convert -size 1920x1080"));
    assert!(calls[0].contains("label:hello\nthere"));
    assert!(calls[0].contains("bgra:-"));
    assert!(calls[0].ends_with("> /dev/fb0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn renderer_failures_are_logged_but_not_errors() {
    let (display, runner) = controller_with(RecordingRunner::failing(1)).await;

    display.render_image(Path::new("/tmp/image.jpg")).await.unwrap();
    display.render_message("hello").await.unwrap();
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn power_command_failures_are_errors() {
    let (display, _) = controller_with(RecordingRunner::failing(1)).await;

    assert!(display.set_enabled(false, false).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn render_image_centers_and_letterboxes_to_the_display() {
    let (display, runner) = controller().await;

    display.render_image(Path::new("/tmp/image.jpg")).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("convert /tmp/image.jpg -resize 1920x1080"));
    assert!(calls[0].contains("-extent 1920x1080"));
    assert!(calls[0].ends_with("> /dev/fb0"));
}
