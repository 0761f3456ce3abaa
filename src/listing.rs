use serde::Deserialize;

use crate::error::FrameError;

/// One photo's metadata from the album feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub title: String,
    pub content_type: String,
    pub source_uri: String,
    pub timestamp_millis: i64,
}

/// The set of entries matching one keyword query. Immutable once fetched;
/// a refresh replaces the whole listing.
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Vec<Entry>,
}

impl Listing {
    pub fn from_json(bytes: &[u8]) -> Result<Self, FrameError> {
        let feed: Feed = serde_json::from_slice(bytes)?;
        Ok(Self {
            entries: feed.feed.entry.into_iter().map(Entry::from).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Wire shape of the provider feed: text values are wrapped in `{"$t": ...}`
// objects and the timestamp lives under a `gphoto$` namespaced key.

#[derive(Debug, Deserialize)]
struct Feed {
    feed: FeedBody,
}

#[derive(Debug, Deserialize)]
struct FeedBody {
    #[serde(default)]
    entry: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    title: TextValue,
    content: RawContent,
    #[serde(rename = "gphoto$timestamp")]
    timestamp: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    #[serde(rename = "$t")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(rename = "type")]
    content_type: String,
    src: String,
}

impl From<RawEntry> for Entry {
    fn from(raw: RawEntry) -> Self {
        // The provider reports epoch milliseconds as a decimal string.
        let timestamp_millis = raw
            .timestamp
            .and_then(|t| t.value.parse::<f64>().ok())
            .map(|millis| millis as i64)
            .unwrap_or(0);
        Self {
            title: raw.title.value,
            content_type: raw.content.content_type,
            source_uri: raw.content.src,
            timestamp_millis,
        }
    }
}
