//! # Provider Runtime Module
//!
//! Selects a playback backend for a source, loads its runtime library,
//! normalizes its native events into the canonical vocabulary and keeps a
//! single active adapter per playback surface.
//!
//! ## Overview
//!
//! This module provides:
//! - Source descriptors and capability predicates
//! - The loader contract and the ordered loader registry
//! - The backend library loader (URL, static export, async factory)
//! - The adapter contract and the native element adapter
//! - Tiered native event normalization with trigger chaining
//! - Capability sub-adapters and the shared audio graph
//! - [`ProviderRuntime`]: selection, hand-off and race protection

pub mod adapter;
pub mod audio_graph;
pub mod capabilities;
pub mod context;
pub mod delegate;
pub mod disposal;
pub mod error;
pub mod frame_loop;
pub mod library;
pub mod loader;
pub mod native;
pub mod probe;
pub mod runtime;
pub mod source;
pub mod tracks;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use adapter::ProviderAdapter;
pub use context::ProviderContext;
pub use delegate::{MediaDelegate, MediaListener, ProviderNotifier};
pub use error::{ProviderError, Result};
pub use library::{LibraryExport, LibraryLoader, LibraryRef};
pub use loader::{select, AudioLoader, LoaderRegistry, ProviderLoader, TargetSlot, VideoLoader};
pub use native::{ElementStrategy, EngineBinding, EngineStrategy, NativeAdapter};
pub use runtime::{PlaybackHandoff, ProviderRuntime, ResumePoint};
pub use source::{MediaType, Source, SourceKind};
