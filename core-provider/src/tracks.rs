//! Local text tracks and media metadata.
//!
//! Caption rendering lives elsewhere; providers only need the track list to
//! forward it (remote receivers cannot pull tracks themselves) and to react
//! when it changes.

use bridge_traits::ListenerId;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackKind {
    Subtitles,
    Captions,
    Descriptions,
    Chapters,
    Metadata,
}

impl TextTrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTrackKind::Subtitles => "subtitles",
            TextTrackKind::Captions => "captions",
            TextTrackKind::Descriptions => "descriptions",
            TextTrackKind::Chapters => "chapters",
            TextTrackKind::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackMode {
    #[default]
    Disabled,
    Hidden,
    Showing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTrack {
    pub id: String,
    pub kind: TextTrackKind,
    pub label: String,
    pub language: Option<String>,
    /// Remote-fetchable location; tracks without one cannot be forwarded.
    pub src: Option<String>,
    pub mime_type: String,
    pub mode: TextTrackMode,
}

impl TextTrack {
    pub fn new(id: impl Into<String>, kind: TextTrackKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            language: None,
            src: None,
            mime_type: "text/vtt".to_string(),
            mode: TextTrackMode::Disabled,
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_mode(mut self, mode: TextTrackMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextTrackChange {
    Added(String),
    Removed(String),
    ModeChanged(String),
}

pub type TextTrackListener = Arc<dyn Fn(&TextTrackChange) + Send + Sync>;

#[derive(Default)]
pub struct TextTrackList {
    tracks: RwLock<Vec<TextTrack>>,
    listeners: Mutex<Vec<(ListenerId, TextTrackListener)>>,
    next_id: AtomicU64,
}

impl TextTrackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> Vec<TextTrack> {
        self.tracks.read().clone()
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }

    /// Add or replace a track by id.
    pub fn add(&self, track: TextTrack) {
        let id = track.id.clone();
        {
            let mut tracks = self.tracks.write();
            tracks.retain(|t| t.id != id);
            tracks.push(track);
        }
        self.emit(TextTrackChange::Added(id));
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut tracks = self.tracks.write();
            let before = tracks.len();
            tracks.retain(|t| t.id != id);
            tracks.len() != before
        };
        if removed {
            self.emit(TextTrackChange::Removed(id.to_string()));
        }
        removed
    }

    pub fn set_mode(&self, id: &str, mode: TextTrackMode) -> bool {
        let changed = {
            let mut tracks = self.tracks.write();
            match tracks.iter_mut().find(|t| t.id == id) {
                Some(track) if track.mode != mode => {
                    track.mode = mode;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(TextTrackChange::ModeChanged(id.to_string()));
        }
        changed
    }

    pub fn subscribe(&self, listener: TextTrackListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    fn emit(&self, change: TextTrackChange) {
        let listeners: Vec<TextTrackListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

impl std::fmt::Debug for TextTrackList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTrackList")
            .field("tracks", &self.len())
            .finish()
    }
}

/// Title and artwork forwarded to remote receivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub poster: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_are_reported() {
        let list = TextTrackList::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        list.subscribe(Arc::new(move |change| sink.lock().push(change.clone())));

        list.add(TextTrack::new("en", TextTrackKind::Subtitles, "English"));
        assert!(list.set_mode("en", TextTrackMode::Showing));
        assert!(!list.set_mode("en", TextTrackMode::Showing));
        assert!(list.remove("en"));
        assert!(!list.remove("en"));

        assert_eq!(
            *seen.lock(),
            vec![
                TextTrackChange::Added("en".into()),
                TextTrackChange::ModeChanged("en".into()),
                TextTrackChange::Removed("en".into()),
            ]
        );
    }

    #[test]
    fn add_replaces_same_id() {
        let list = TextTrackList::new();
        list.add(TextTrack::new("a", TextTrackKind::Captions, "A"));
        list.add(TextTrack::new("a", TextTrackKind::Captions, "A2"));
        assert_eq!(list.len(), 1);
        assert_eq!(list.tracks()[0].label, "A2");
    }
}
