//! Grouping of resolved streams into user-selectable download options.

use crate::resolver::ResolvedStream;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Titles are cut to this many characters before they become a filename.
pub const MAX_STEM_CHARS: usize = 55;
/// Characters that are unsafe in filenames on at least one common file system.
const UNSAFE_CHARS: [char; 11] = ['\\', '>', '<', '"', '|', '*', '?', '%', ':', '#', '/'];
/// Stem used when nothing of the title survives sanitizing.
const FALLBACK_STEM: &str = "video";

/// One downloadable choice.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOption {
    /// A single stream carrying both audio and video.
    Muxed(ResolvedStream),
    /// A video-only stream, paired with the default audio stream when there is one.
    Adaptive {
        video: ResolvedStream,
        audio: Option<ResolvedStream>,
    },
    /// An audio-only stream.
    AudioOnly(ResolvedStream),
}

impl StreamOption {
    /// The stream that names the option: the video stream, or the audio stream for audio-only options.
    pub fn primary(&self) -> &ResolvedStream {
        match self {
            StreamOption::Muxed(stream) | StreamOption::AudioOnly(stream) => stream,
            StreamOption::Adaptive { video, .. } => video,
        }
    }

    /// The quality label, e.g. '720p', '1080p60' or '160k'.
    pub fn label(&self) -> String {
        let spec = self.primary().spec;
        match spec.height {
            Some(height) if spec.fps == 60 => format!("{}p60", height),
            Some(height) => format!("{}p", height),
            None => format!("{}k", spec.audio_bitrate.unwrap_or_default()),
        }
    }

    pub fn ext(&self) -> &'static str {
        self.primary().spec.ext
    }

    /// The label and extension together, unique within a bundle.
    pub fn key(&self) -> String {
        format!("{}-{}", self.label(), self.ext())
    }

    pub fn is_video_bearing(&self) -> bool {
        !matches!(self, StreamOption::AudioOnly(_))
    }

    pub fn streams(&self) -> Vec<&ResolvedStream> {
        match self {
            StreamOption::Muxed(stream) | StreamOption::AudioOnly(stream) => vec![stream],
            StreamOption::Adaptive { video, audio } => {
                std::iter::once(video).chain(audio.as_ref()).collect()
            }
        }
    }

    /// Whether any stream of the option still needs external descrambling.
    pub fn needs_descrambling(&self) -> bool {
        self.streams().iter().any(|stream| stream.cipher_resolution)
    }

    /// The output filename of the option.
    pub fn filename(&self, stem: &str) -> String {
        format!("{}_{}.{}", stem, self.label(), self.ext())
    }

    /// Every stream of the option with the file it is saved to.
    pub fn files(&self, stem: &str) -> Vec<(&ResolvedStream, String)> {
        let mut files = vec![(self.primary(), self.filename(stem))];
        if let StreamOption::Adaptive {
            audio: Some(audio), ..
        } = self
        {
            let name = format!("{}_{}.audio.{}", stem, self.label(), audio.spec.ext);
            files.push((audio, name));
        }
        files
    }

    fn rank(&self) -> (bool, u32, u32, u32, bool) {
        let spec = self.primary().spec;
        (
            spec.height.is_some(),
            spec.height.unwrap_or_default(),
            spec.fps,
            spec.audio_bitrate.unwrap_or_default(),
            matches!(self, StreamOption::Muxed(_)),
        )
    }
}

impl fmt::Display for StreamOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            StreamOption::Muxed(_) => "video+audio",
            StreamOption::Adaptive { audio: Some(_), .. } => "video, separate audio",
            StreamOption::Adaptive { audio: None, .. } => "video only",
            StreamOption::AudioOnly(_) => "audio only",
        };
        write!(f, "{:<8} {:<5} {}", self.label(), self.ext(), kind)?;
        if self.needs_descrambling() {
            write!(f, " (signature-protected)")?;
        }
        Ok(())
    }
}

/// Every download option for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBundle {
    pub title: String,
    /// Sanitized title used to name output files.
    pub stem: String,
    /// Options ordered from highest to lowest quality, video before audio.
    pub options: Vec<StreamOption>,
    /// Player script an external descrambler would need, if the page referenced one.
    pub player_script: Option<String>,
}

impl StreamBundle {
    /// Finds an option by key ('720p-webm') or, failing that, by label ('720p').
    pub fn find(&self, selection: &str) -> Option<&StreamOption> {
        let selection = selection.trim();
        self.options
            .iter()
            .find(|option| option.key() == selection)
            .or_else(|| self.options.iter().find(|option| option.label() == selection))
    }

    pub fn labels(&self) -> Vec<String> {
        self.options.iter().map(StreamOption::label).collect()
    }

    pub fn filename(&self, option: &StreamOption) -> String {
        option.filename(&self.stem)
    }
}

/// Derives a filename stem from a video title.
///
/// The title is cut to its first [`MAX_STEM_CHARS`] characters and stripped of unsafe characters.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .take(MAX_STEM_CHARS)
        .filter(|c| !UNSAFE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Groups resolved streams into download options.
///
/// Muxed streams stand alone. Each video-only stream is paired with the default audio stream.
/// Audio-only streams that no video was paired with are offered on their own. When two options
/// would share a label and extension, a fetchable option replaces a signature-protected one;
/// otherwise the first one in tag order wins, muxed before adaptive.
pub fn assemble(title: &str, streams: &BTreeMap<u32, ResolvedStream>) -> StreamBundle {
    let audio: Vec<&ResolvedStream> = streams
        .values()
        .filter(|stream| stream.spec.is_audio_only())
        .collect();

    let muxed = streams
        .values()
        .filter(|stream| stream.spec.is_muxed())
        .map(|stream| StreamOption::Muxed(stream.clone()));
    let adaptive = streams
        .values()
        .filter(|stream| stream.spec.is_video_only())
        .map(|video| StreamOption::Adaptive {
            video: video.clone(),
            audio: default_audio(&audio, video.spec.ext).cloned(),
        });

    let mut options = OptionSet::default();
    muxed.chain(adaptive).for_each(|option| options.offer(option));

    let paired: HashSet<u32> = options
        .items
        .iter()
        .filter_map(|option| match option {
            StreamOption::Adaptive {
                audio: Some(audio), ..
            } => Some(audio.itag),
            _ => None,
        })
        .collect();
    audio
        .iter()
        .filter(|stream| !paired.contains(&stream.itag))
        .for_each(|stream| options.offer(StreamOption::AudioOnly((*stream).clone())));

    let mut options = options.items;
    options.sort_by(|a, b| b.rank().cmp(&a.rank()));

    let stem = sanitize_filename(title);
    StreamBundle {
        title: title.to_string(),
        stem: if stem.is_empty() {
            FALLBACK_STEM.to_string()
        } else {
            stem
        },
        options,
        player_script: None,
    }
}

/// Options in insertion order, unique on their key.
#[derive(Default)]
struct OptionSet {
    items: Vec<StreamOption>,
    slots: HashMap<String, usize>,
}

impl OptionSet {
    fn offer(&mut self, option: StreamOption) {
        let key = option.key();
        match self.slots.get(&key) {
            Some(&slot) if self.items[slot].needs_descrambling() && !option.needs_descrambling() => {
                log::debug!("Option {} replaces a signature-protected duplicate", key);
                self.items[slot] = option;
            }
            Some(_) => log::debug!("Dropping duplicate option {}", key),
            None => {
                self.slots.insert(key, self.items.len());
                self.items.push(option);
            }
        }
    }
}

/// The audio stream paired with a video of the given container.
///
/// Prefers a fetchable stream of the same container family, then the highest bitrate.
fn default_audio<'a>(audio: &[&'a ResolvedStream], video_ext: &str) -> Option<&'a ResolvedStream> {
    let family = match video_ext {
        "mp4" => "m4a",
        other => other,
    };
    let score = |stream: &&&'a ResolvedStream| {
        (
            stream.is_fetchable(),
            stream.spec.audio_bitrate.unwrap_or_default(),
        )
    };

    audio
        .iter()
        .filter(|stream| stream.spec.ext == family)
        .max_by_key(score)
        .or_else(|| audio.iter().max_by_key(score))
        .copied()
}
