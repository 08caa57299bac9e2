//! Audio Graph Abstraction
//!
//! A host audio context (Web Audio, a native mixer graph) that can route an
//! element's output through a gain stage. The core shares one context across
//! every playback surface and tears it down when the last node is released.

use std::sync::Arc;

use crate::error::Result;
use crate::surface::MediaElement;

/// Creates host audio contexts.
pub trait AudioContextFactory: Send + Sync {
    /// Whether the host can currently provide an audio context. This may
    /// change at runtime (e.g. after a user gesture unlocks audio output).
    fn is_available(&self) -> bool;

    fn create_context(&self) -> Result<Arc<dyn AudioContext>>;
}

/// A live host audio context.
pub trait AudioContext: Send + Sync {
    fn create_gain(&self) -> Result<Box<dyn GainNode>>;

    /// Capture the output of a media element as a graph source.
    fn create_element_source(&self, element: &Arc<dyn MediaElement>) -> Result<Box<dyn SourceNode>>;

    /// Release the context and every resource it owns.
    fn close(&self);
}

pub trait GainNode: Send + Sync {
    fn set_gain(&self, gain: f64);
    fn gain(&self) -> f64;
    fn connect_to_destination(&self);
    fn disconnect(&self);
}

pub trait SourceNode: Send + Sync {
    fn connect(&self, gain: &dyn GainNode);
    fn disconnect(&self);
}
