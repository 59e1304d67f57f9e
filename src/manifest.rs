//! Extraction of the player configuration embedded in a watch page.
//!
//! The page assigns a single JSON object to `ytInitialPlayerResponse`. Only the parts the
//! resolver needs are modelled; format entries are kept as raw JSON so that one malformed
//! entry cannot spoil the whole manifest.

use crate::error::{Error, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;

static PLAYER_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:var\s+)?ytInitialPlayerResponse\s*=\s*(\{.+?\})\s*;").unwrap()
});

/// The parsed player configuration of one watch page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManifest {
    #[serde(default, deserialize_with = "lenient")]
    pub streaming_data: Option<StreamingData>,
    #[serde(default, deserialize_with = "lenient")]
    pub video_details: Option<VideoDetails>,
}

/// The two sibling format arrays. `None` when missing, null or not an array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    /// Muxed entries, audio and video together.
    #[serde(default, deserialize_with = "lenient")]
    pub formats: Option<Vec<Value>>,
    /// Video-only or audio-only entries.
    #[serde(default, deserialize_with = "lenient")]
    pub adaptive_formats: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
}

/// Reads a field of an unexpected shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// One entry of either format array, as much of it as the resolver reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatEntry {
    pub itag: u32,
    pub url: Option<String>,
    #[serde(alias = "cipher")]
    pub signature_cipher: Option<String>,
    #[serde(rename = "type")]
    pub stream_type: Option<String>,
}

impl RawManifest {
    /// The display title of the video, if the page carries one.
    pub fn title(&self) -> Option<&str> {
        self.video_details
            .as_ref()
            .and_then(|details| details.title.as_deref())
            .filter(|title| !title.trim().is_empty())
    }

    pub fn muxed_entries(&self) -> &[Value] {
        self.streaming_data
            .as_ref()
            .and_then(|data| data.formats.as_deref())
            .unwrap_or_default()
    }

    pub fn adaptive_entries(&self) -> &[Value] {
        self.streaming_data
            .as_ref()
            .and_then(|data| data.adaptive_formats.as_deref())
            .unwrap_or_default()
    }
}

impl FormatEntry {
    /// Reads a single raw entry. `None` when the entry lacks a numeric `itag` or has wrongly typed fields.
    pub fn parse(raw: &Value) -> Option<Self> {
        match serde_json::from_value(raw.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping malformed format entry: {}", e);
                None
            }
        }
    }
}

/// Locates the player configuration assignment in the page markup and parses it.
///
/// # Errors
///
/// Returns [`Error::ManifestNotFound`] if the assignment is absent or its value is not valid JSON.
/// This usually means the page layout has changed.
pub fn extract(markup: &str) -> Result<RawManifest> {
    let captures = PLAYER_RESPONSE.captures(markup).ok_or_else(|| {
        Error::ManifestNotFound("no ytInitialPlayerResponse assignment".to_string())
    })?;

    serde_json::from_str(&captures[1])
        .map_err(|e| Error::ManifestNotFound(format!("invalid player response JSON: {}", e)))
}
