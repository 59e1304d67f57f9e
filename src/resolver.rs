//! Resolution of manifest format entries into fetchable streams.

use crate::catalog::{self, FormatSpec};
use crate::manifest::{FormatEntry, RawManifest};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Segments generated on the fly; they have no stable complete URL.
pub const OTF_STREAM_TYPE: &str = "FORMAT_STREAM_TYPE_OTF";

/// A format entry resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub itag: u32,
    pub spec: &'static FormatSpec,
    /// The media URL. For cipher-protected streams this is the base URL, still missing its signature.
    pub url: String,
    /// The URL needs an external descrambling step before it can be fetched.
    pub cipher_resolution: bool,
    /// The scrambled signature token, kept untouched for the descrambler.
    pub signature: Option<String>,
}

impl ResolvedStream {
    /// Whether the URL can be fetched as is.
    pub fn is_fetchable(&self) -> bool {
        !self.cipher_resolution
    }
}

impl fmt::Display for ResolvedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolvedStream({}", self.spec)?;
        if self.cipher_resolution {
            write!(f, ", ciphered")?;
        }
        write!(f, ")")
    }
}

/// Resolves every usable entry of the manifest, keyed by format tag.
///
/// Muxed entries are walked first, then adaptive ones; a later entry with an already-seen tag
/// replaces the earlier one. Entries that are on-the-fly segments, have an unknown tag, or carry
/// neither a URL nor a signature cipher are skipped.
pub fn resolve(manifest: &RawManifest) -> BTreeMap<u32, ResolvedStream> {
    let mut streams = BTreeMap::new();

    let entries = manifest
        .muxed_entries()
        .iter()
        .chain(manifest.adaptive_entries());

    for raw in entries {
        if let Some(stream) = resolve_entry(raw) {
            if let Some(previous) = streams.insert(stream.itag, stream) {
                log::debug!("Format {} seen twice, keeping the last entry", previous.itag);
            }
        }
    }

    streams
}

fn resolve_entry(raw: &Value) -> Option<ResolvedStream> {
    let entry = FormatEntry::parse(raw)?;

    if entry.stream_type.as_deref() == Some(OTF_STREAM_TYPE) {
        log::debug!("Skipping on-the-fly format {}", entry.itag);
        return None;
    }

    let Some(spec) = catalog::lookup(entry.itag) else {
        log::debug!("Skipping unknown format {}", entry.itag);
        return None;
    };

    if let Some(url) = entry.url {
        return Some(ResolvedStream {
            itag: entry.itag,
            spec,
            url: unescape_ampersands(&url),
            cipher_resolution: false,
            signature: None,
        });
    }

    if let Some(cipher) = entry.signature_cipher {
        let Some(parts) = CipherParts::parse(&cipher) else {
            log::debug!("Skipping format {}: signature cipher has no url", entry.itag);
            return None;
        };
        log::warn!("Format {} is signature-protected", entry.itag);

        return Some(ResolvedStream {
            itag: entry.itag,
            spec,
            url: parts.url,
            cipher_resolution: true,
            signature: parts.signature,
        });
    }

    log::debug!("Skipping format {}: no url nor signature cipher", entry.itag);
    None
}

/// Replaces the JSON-escaped ampersands left in a URL.
fn unescape_ampersands(url: &str) -> String {
    url.replace("\\u0026", "&")
}

/// The decoded components of a signature cipher blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherParts {
    /// The base media URL.
    pub url: String,
    /// The scrambled signature, from the `s` component.
    pub signature: Option<String>,
}

impl CipherParts {
    /// Parses an ampersand-delimited cipher blob such as `s=ABC&sp=sig&url=https%3A%2F%2F...`.
    ///
    /// Returns `None` when there is no `url` component.
    pub fn parse(cipher: &str) -> Option<Self> {
        let cipher = unescape_ampersands(cipher);
        let mut url = None;
        let mut signature = None;

        for pair in cipher.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let slot = match key {
                "url" => &mut url,
                "s" => &mut signature,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(percent_decode(value));
            }
        }

        Some(Self {
            url: url.filter(|url| !url.is_empty())?,
            signature,
        })
    }
}

fn percent_decode(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}
