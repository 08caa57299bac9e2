//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every provider crate:
//! - Logging and tracing setup
//! - Runtime configuration and settings
//! - Canonical media event vocabulary, trigger chains and the event bus
//! - The canonical media state store
//!
//! ## Overview
//!
//! Backends never talk to UI consumers directly. They translate what they see
//! into [`events::MediaEventKind`] values, which the provider runtime folds
//! into a [`state::MediaStore`] and broadcasts on an [`events::EventBus`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod state;

pub use error::{Error, Result};
