//! # HLS Provider
//!
//! Adaptive-streaming playback through an external engine attached to the
//! host media element.
//!
//! ## Overview
//!
//! This module provides:
//! - The engine contract ([`HlsEngineFactory`], [`HlsEngine`]) the host
//!   library is adapted to
//! - [`HlsEngineStrategy`], composed onto the native adapter, which loads the
//!   engine library and maps engine events onto canonical ones
//! - [`HlsLoader`], selected for HLS sources when the host supports
//!   media-source extensions

pub mod engine;
pub mod error;
pub mod loader;
pub mod strategy;

pub use engine::{HlsEngine, HlsEngineFactory, HlsErrorKind, HlsEvent, HlsListener};
pub use error::{HlsError, Result};
pub use loader::HlsLoader;
pub use strategy::HlsEngineStrategy;
