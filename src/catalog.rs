//! The static table of known format tags ("itags").
//!
//! Every row is a snapshot of the platform's own numbering scheme, so the values must stay exact:
//! a wrong codec or resolution for a tag is visible to the user as a mislabelled download.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Frame rate assumed for every video format that does not say otherwise.
pub const DEFAULT_FPS: u32 = 30;

/// The video codec of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    None,
    H263,
    Mpeg4,
    H264,
    Vp8,
    Vp9,
}

/// The audio codec of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    None,
    Mp3,
    Aac,
    Vorbis,
    Opus,
}

/// Fixed metadata for one format tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatSpec {
    /// The numeric tag, unique within the catalog.
    pub itag: u32,
    /// The container extension, e.g. 'mp4' or 'm4a'.
    pub ext: &'static str,
    /// The vertical resolution in pixels, `None` for audio-only formats.
    pub height: Option<u32>,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    /// The audio bitrate in kbps, `None` for video-only formats.
    pub audio_bitrate: Option<u32>,
    pub fps: u32,
    /// Video-only or audio-only stream, meant to be paired with a complementary one.
    pub adaptive: bool,
    /// Served as part of a live (HLS) stream.
    pub live: bool,
}

impl FormatSpec {
    const fn muxed(
        itag: u32,
        ext: &'static str,
        height: u32,
        video_codec: VideoCodec,
        audio_codec: AudioCodec,
        audio_bitrate: u32,
    ) -> Self {
        Self {
            itag,
            ext,
            height: Some(height),
            video_codec,
            audio_codec,
            audio_bitrate: Some(audio_bitrate),
            fps: DEFAULT_FPS,
            adaptive: false,
            live: false,
        }
    }

    const fn video(itag: u32, ext: &'static str, height: u32, video_codec: VideoCodec) -> Self {
        Self::video_fps(itag, ext, height, video_codec, DEFAULT_FPS)
    }

    const fn video_fps(
        itag: u32,
        ext: &'static str,
        height: u32,
        video_codec: VideoCodec,
        fps: u32,
    ) -> Self {
        Self {
            itag,
            ext,
            height: Some(height),
            video_codec,
            audio_codec: AudioCodec::None,
            audio_bitrate: None,
            fps,
            adaptive: true,
            live: false,
        }
    }

    const fn audio(itag: u32, ext: &'static str, audio_codec: AudioCodec, bitrate: u32) -> Self {
        Self {
            itag,
            ext,
            height: None,
            video_codec: VideoCodec::None,
            audio_codec,
            audio_bitrate: Some(bitrate),
            fps: DEFAULT_FPS,
            adaptive: true,
            live: false,
        }
    }

    const fn live(itag: u32, height: u32, audio_bitrate: u32) -> Self {
        Self {
            live: true,
            ..Self::muxed(itag, "mp4", height, VideoCodec::H264, AudioCodec::Aac, audio_bitrate)
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_codec != VideoCodec::None
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec != AudioCodec::None
    }

    /// Both audio and video in one stream.
    pub fn is_muxed(&self) -> bool {
        self.has_video() && self.has_audio()
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video() && !self.has_audio()
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.itag)?;
        if let Some(height) = self.height {
            write!(f, "{}p{} ", height, self.fps)?;
        }
        write!(f, "{} {:?}/{:?}", self.ext, self.video_codec, self.audio_codec)?;
        if let Some(bitrate) = self.audio_bitrate {
            write!(f, " {}k", bitrate)?;
        }
        Ok(())
    }
}

use AudioCodec as A;
use VideoCodec as V;

/// See https://en.wikipedia.org/wiki/YouTube#Quality_and_formats
const FORMATS: &[FormatSpec] = &[
    // Video and audio
    FormatSpec::muxed(17, "3gp", 144, V::Mpeg4, A::Aac, 24),
    FormatSpec::muxed(36, "3gp", 240, V::Mpeg4, A::Aac, 32),
    FormatSpec::muxed(5, "flv", 240, V::H263, A::Mp3, 64),
    FormatSpec::muxed(43, "webm", 360, V::Vp8, A::Vorbis, 128),
    FormatSpec::muxed(18, "mp4", 360, V::H264, A::Aac, 96),
    FormatSpec::muxed(22, "mp4", 720, V::H264, A::Aac, 192),
    // Dash video
    FormatSpec::video(160, "mp4", 144, V::H264),
    FormatSpec::video(133, "mp4", 240, V::H264),
    FormatSpec::video(134, "mp4", 360, V::H264),
    FormatSpec::video(135, "mp4", 480, V::H264),
    FormatSpec::video(136, "mp4", 720, V::H264),
    FormatSpec::video(137, "mp4", 1080, V::H264),
    FormatSpec::video(264, "mp4", 1440, V::H264),
    FormatSpec::video(266, "mp4", 2160, V::H264),
    FormatSpec::video_fps(298, "mp4", 720, V::H264, 60),
    FormatSpec::video_fps(299, "mp4", 1080, V::H264, 60),
    // Dash audio
    FormatSpec::audio(140, "m4a", A::Aac, 128),
    FormatSpec::audio(141, "m4a", A::Aac, 256),
    FormatSpec::audio(256, "m4a", A::Aac, 192),
    FormatSpec::audio(258, "m4a", A::Aac, 384),
    // WebM dash video
    FormatSpec::video(278, "webm", 144, V::Vp9),
    FormatSpec::video(242, "webm", 240, V::Vp9),
    FormatSpec::video(243, "webm", 360, V::Vp9),
    FormatSpec::video(244, "webm", 480, V::Vp9),
    FormatSpec::video(247, "webm", 720, V::Vp9),
    FormatSpec::video(248, "webm", 1080, V::Vp9),
    FormatSpec::video(271, "webm", 1440, V::Vp9),
    FormatSpec::video(313, "webm", 2160, V::Vp9),
    FormatSpec::video_fps(302, "webm", 720, V::Vp9, 60),
    FormatSpec::video_fps(308, "webm", 1440, V::Vp9, 60),
    FormatSpec::video_fps(303, "webm", 1080, V::Vp9, 60),
    FormatSpec::video_fps(315, "webm", 2160, V::Vp9, 60),
    // WebM dash audio
    FormatSpec::audio(171, "webm", A::Vorbis, 128),
    FormatSpec::audio(249, "webm", A::Opus, 48),
    FormatSpec::audio(250, "webm", A::Opus, 64),
    FormatSpec::audio(251, "webm", A::Opus, 160),
    // HLS live stream
    FormatSpec::live(91, 144, 48),
    FormatSpec::live(92, 240, 48),
    FormatSpec::live(93, 360, 128),
    FormatSpec::live(94, 480, 128),
    FormatSpec::live(95, 720, 256),
    FormatSpec::live(96, 1080, 256),
];

static CATALOG: LazyLock<HashMap<u32, &'static FormatSpec>> =
    LazyLock::new(|| FORMATS.iter().map(|spec| (spec.itag, spec)).collect());

/// Looks up the fixed metadata of a format tag.
///
/// Unknown tags return `None`; callers skip such entries rather than failing.
pub fn lookup(itag: u32) -> Option<&'static FormatSpec> {
    let spec = CATALOG.get(&itag).copied();
    if let Some(spec) = spec {
        log::trace!("Catalog hit: {}", spec);
    }
    spec
}

/// Every format known to the catalog, in table order.
pub fn all() -> &'static [FormatSpec] {
    FORMATS
}
