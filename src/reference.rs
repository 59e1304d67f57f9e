//! Turns user input into a canonical video identifier.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static PAGE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:http|https)://(?:www\.|m\.|)youtube\.com/watch\?v=(.+?)(?: |\z|&)").unwrap()
});
static SHORT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:http|https)://(?:www\.|)youtu\.be/(.+?)(?: |\z|&)").unwrap());
static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:graph:]]+$").unwrap());

/// Characters that would break the watch URL if they ended up inside an identifier.
const SEPARATORS: [char; 5] = ['/', '?', '&', '#', '='];

/// A canonical video identifier, safe to splice into a watch URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn checked(candidate: &str, input: &str) -> Result<Self> {
        if BARE_ID.is_match(candidate) && !candidate.contains(SEPARATORS) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(Error::InvalidReference(input.to_string()))
        }
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the video identifier from a watch URL, a short link, or a bare identifier.
///
/// The first matching shape wins. No network access happens here.
///
/// # Errors
///
/// Returns [`Error::InvalidReference`] when the input matches none of the shapes.
///
/// # Examples
///
/// ```rust
/// # use tubedl::reference::extract;
/// let id = extract("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").unwrap();
/// assert_eq!(id.as_str(), "dQw4w9WgXcQ");
/// ```
pub fn extract(input: &str) -> Result<VideoId> {
    for pattern in [&*PAGE_LINK, &*SHORT_LINK] {
        if let Some(captures) = pattern.captures(input) {
            return VideoId::checked(&captures[1], input);
        }
    }

    VideoId::checked(input, input)
}
