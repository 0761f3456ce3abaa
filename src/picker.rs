use rand::Rng;
use tracing::{debug, warn};

use crate::listing::Listing;

/// How many random samples to take before giving up on a listing.
pub const MAX_ATTEMPTS: u32 = 5;

/// Size segment the provider embeds in source URIs when `imgmax=1600u` is
/// requested; rewritten to the configured display width before download.
const SOURCE_SIZE_SEGMENT: &str = "/s1600/";

/// Titles whose final dot-segment is one of these are bare filenames, not
/// captions worth showing.
const BARE_FILENAME_EXTENSIONS: &[&str] = &["jpg", "png", "dng", "jpeg", "gif", "bmp"];

#[derive(Debug, Clone, PartialEq)]
pub struct PickedImage {
    pub uri: String,
    pub mime: String,
    pub caption: String,
    pub timestamp_millis: i64,
}

/// Samples a uniformly random entry up to [`MAX_ATTEMPTS`] times and returns
/// the first displayable one. Videos and gifs are skipped; gif is excluded
/// even though it is nominally an image type.
pub fn pick<R: Rng>(listing: &Listing, width: u32, rng: &mut R) -> Option<PickedImage> {
    if listing.is_empty() {
        return None;
    }
    for _ in 0..MAX_ATTEMPTS {
        let entry = &listing.entries[rng.gen_range(0..listing.entries.len())];
        if !is_eligible(&entry.content_type) {
            debug!(mime = %entry.content_type, "skipping unsupported media");
            continue;
        }
        return Some(PickedImage {
            uri: rewrite_size_segment(&entry.source_uri, width),
            mime: entry.content_type.clone(),
            caption: caption_for(&entry.title),
            timestamp_millis: entry.timestamp_millis,
        });
    }
    None
}

fn is_eligible(content_type: &str) -> bool {
    content_type.contains("image") && !content_type.contains("gif")
}

/// Blanks titles that are really filenames; anything else is kept verbatim.
pub fn caption_for(title: &str) -> String {
    let lowered = title.to_lowercase();
    let last = lowered.rsplit('.').next().unwrap_or("");
    if BARE_FILENAME_EXTENSIONS.contains(&last) {
        String::new()
    } else {
        title.to_string()
    }
}

/// Replaces the first size segment with one matching the display width,
/// leaving the rest of the URI untouched.
pub fn rewrite_size_segment(uri: &str, width: u32) -> String {
    uri.replacen(SOURCE_SIZE_SEGMENT, &format!("/s{width}/"), 1)
}

/// Scratch-file extension for a mime type; unknown types get a sentinel
/// rather than failing, the renderer sniffs the real format anyway.
pub fn extension_for(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        other => {
            warn!(mime = other, "unrecognized mime type");
            "xxx"
        }
    }
}
