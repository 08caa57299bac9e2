//! Native element adapter.
//!
//! One adapter core drives every backend that renders into a host media
//! element. What differs per backend (direct `src` assignment, an attached
//! streaming engine) lives in a pluggable [`EngineStrategy`].

mod adapter;
mod engine;
mod pipeline;

pub use adapter::NativeAdapter;
pub use engine::{ElementStrategy, EngineBinding, EngineStrategy};
pub use pipeline::{should_snap_to_end, ListenerTier, NativePipeline};
