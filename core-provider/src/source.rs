//! Source descriptors.
//!
//! A [`Source`] pairs what to play (a URL or a live stream handle) with its
//! MIME type. Sources are immutable once handed to a provider; equality is
//! used to detect repeated loads and lost races.

use bridge_traits::StreamHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

const HLS_MIME_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
    "video/mpegurl",
    "video/x-mpegurl",
];

const AUDIO_EXTENSIONS: &[&str] = &[
    "m4a", "m4b", "mp4a", "mpga", "mp2", "mp2a", "mp3", "m2a", "m3a", "wav", "weba", "aac", "oga",
    "spx", "flac",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "ogg", "ogv", "webm", "mov", "m4v"];

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Url(String),
    Stream(StreamHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    kind: SourceKind,
    mime_type: String,
}

impl Source {
    pub fn url(src: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Url(src.into()),
            mime_type: mime_type.into(),
        }
    }

    /// A URL whose type is inferred from the consumer; leave empty if unknown.
    pub fn untyped(src: impl Into<String>) -> Self {
        Self::url(src, String::new())
    }

    pub fn stream(handle: StreamHandle, mime_type: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Stream(handle),
            mime_type: mime_type.into(),
        }
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// The URL, or `None` for stream sources.
    pub fn src(&self) -> Option<&str> {
        match &self.kind {
            SourceKind::Url(url) => Some(url),
            SourceKind::Stream(_) => None,
        }
    }

    pub fn stream_handle(&self) -> Option<&StreamHandle> {
        match &self.kind {
            SourceKind::Stream(handle) => Some(handle),
            SourceKind::Url(_) => None,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.kind, SourceKind::Stream(_))
    }

    /// Lowercased file extension of the URL path, ignoring query and fragment.
    pub fn extension(&self) -> Option<String> {
        let src = self.src()?;
        let path = src.split(|c: char| c == '?' || c == '#').next().unwrap_or(src);
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SourceKind::Url(url) => f.write_str(core_runtime::logging::redact_src(url)),
            SourceKind::Stream(handle) => write!(f, "stream:{}", handle.label()),
        }
    }
}

/// What kind of element a loader will render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Unknown,
}

pub fn is_hls_src(source: &Source) -> bool {
    let mime = source.mime_type().to_ascii_lowercase();
    if HLS_MIME_TYPES.contains(&mime.as_str()) {
        return true;
    }
    source.extension().as_deref() == Some("m3u8")
}

pub fn is_audio_src(source: &Source) -> bool {
    if source.is_stream() {
        return false;
    }
    let mime = source.mime_type().to_ascii_lowercase();
    if mime.starts_with("audio/") {
        return !HLS_MIME_TYPES.contains(&mime.as_str());
    }
    mime.is_empty()
        && source
            .extension()
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
}

/// Live streams always count as video.
pub fn is_video_src(source: &Source) -> bool {
    if source.is_stream() {
        return true;
    }
    let mime = source.mime_type().to_ascii_lowercase();
    if mime.starts_with("video/") {
        return !HLS_MIME_TYPES.contains(&mime.as_str());
    }
    mime.is_empty()
        && source
            .extension()
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
}
