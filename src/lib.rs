//! Workspace umbrella crate.
//!
//! This crate exists to expose feature flags that map to the workspace crates.
//! Host applications can depend on `media-provider-workspace` and enable the
//! documented features without wiring each crate individually:
//!
//! - `hls` (default): [`core_service`] with the adaptive-streaming provider
//! - `cast`: [`core_service`] with the remote-playback provider
//! - `native-only`: just [`core_provider`] with the built-in video and audio
//!   loaders

#[cfg(any(feature = "hls", feature = "cast"))]
pub use core_service;

#[cfg(feature = "native-only")]
pub use core_provider;
