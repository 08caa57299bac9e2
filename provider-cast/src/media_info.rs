//! Receiver load requests built from local playback state.
//!
//! Receivers cannot pull local text tracks, so every request carries the full
//! track list. Tracks without a fetchable `src` are left out; track ids are
//! 1-based positions among the forwarded tracks.

use crate::error::{CastError, Result};
use bridge_traits::{CastLoadRequest, CastMediaInfo, CastMetadata, CastStreamType, CastTrack};
use core_provider::tracks::{MediaMetadata, TextTrack, TextTrackMode};
use core_provider::Source;
use core_runtime::events::StreamType;

/// Where the receiver should start and whether it should play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPosition {
    pub time: f64,
    pub autoplay: bool,
}

pub fn cast_stream_type(stream_type: StreamType) -> CastStreamType {
    match stream_type {
        StreamType::Live | StreamType::LiveDvr => CastStreamType::Live,
        StreamType::OnDemand => CastStreamType::Buffered,
        StreamType::Unknown => CastStreamType::Other,
    }
}

pub fn cast_tracks(tracks: &[TextTrack]) -> Vec<CastTrack> {
    forwarded(tracks)
        .map(|(track_id, track)| CastTrack {
            track_id,
            subtype: track.kind.as_str().to_string(),
            name: track.label.clone(),
            language: track.language.clone(),
            track_content_id: track.src.clone().unwrap_or_default(),
            track_content_type: track.mime_type.clone(),
        })
        .collect()
}

/// Ids of forwarded tracks that are currently showing.
pub fn active_track_ids(tracks: &[TextTrack]) -> Vec<u32> {
    forwarded(tracks)
        .filter(|(_, track)| track.mode == TextTrackMode::Showing)
        .map(|(track_id, _)| track_id)
        .collect()
}

fn forwarded(tracks: &[TextTrack]) -> impl Iterator<Item = (u32, &TextTrack)> {
    tracks
        .iter()
        .filter(|track| track.src.is_some())
        .zip(1u32..)
        .map(|(track, id)| (id, track))
}

pub fn build_load_request(
    source: &Source,
    stream_type: StreamType,
    tracks: &[TextTrack],
    metadata: &MediaMetadata,
    start: StartPosition,
) -> Result<CastLoadRequest> {
    let src = source.src().ok_or(CastError::StreamSource)?;
    let content_type = if source.mime_type().is_empty() {
        "video/mp4".to_string()
    } else {
        source.mime_type().to_string()
    };

    Ok(CastLoadRequest {
        media_info: CastMediaInfo {
            src: src.to_string(),
            content_type,
            stream_type: cast_stream_type(stream_type),
            tracks: cast_tracks(tracks),
            metadata: CastMetadata {
                title: metadata.title.clone(),
                poster: metadata.poster.clone(),
            },
        },
        autoplay: start.autoplay,
        current_time: start.time.max(0.0),
        active_track_ids: active_track_ids(tracks),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::StreamHandle;
    use core_provider::tracks::TextTrackKind;

    fn tracks() -> Vec<TextTrack> {
        vec![
            TextTrack::new("en", TextTrackKind::Subtitles, "English")
                .with_src("https://a/en.vtt")
                .with_language("en"),
            // Local-only track, cannot be forwarded.
            TextTrack::new("local", TextTrackKind::Captions, "Local"),
            TextTrack::new("fr", TextTrackKind::Subtitles, "Français")
                .with_src("https://a/fr.vtt")
                .with_mode(TextTrackMode::Showing),
        ]
    }

    #[test]
    fn test_tracks_without_src_are_skipped() {
        let cast = cast_tracks(&tracks());
        assert_eq!(cast.len(), 2);
        assert_eq!(cast[0].track_id, 1);
        assert_eq!(cast[1].track_id, 2);
        assert_eq!(cast[1].track_content_id, "https://a/fr.vtt");
        assert_eq!(cast[0].subtype, "subtitles");
        assert_eq!(active_track_ids(&tracks()), vec![2]);
    }

    #[test]
    fn test_build_request() {
        let metadata = MediaMetadata {
            title: Some("Clip".into()),
            poster: None,
        };
        let request = build_load_request(
            &Source::url("https://a/master.m3u8", "application/x-mpegurl"),
            StreamType::LiveDvr,
            &tracks(),
            &metadata,
            StartPosition {
                time: 42.0,
                autoplay: true,
            },
        )
        .unwrap();

        assert_eq!(request.media_info.stream_type, CastStreamType::Live);
        assert_eq!(request.media_info.metadata.title.as_deref(), Some("Clip"));
        assert_eq!(request.current_time, 42.0);
        assert!(request.autoplay);
        assert_eq!(request.active_track_ids, vec![2]);
    }

    #[test]
    fn test_stream_handles_are_rejected() {
        let source = Source::stream(StreamHandle::new(1, "camera"), "video/webm");
        let err = build_load_request(
            &source,
            StreamType::Live,
            &[],
            &MediaMetadata::default(),
            StartPosition {
                time: 0.0,
                autoplay: false,
            },
        )
        .unwrap_err();
        assert_eq!(err, CastError::StreamSource);
    }
}
