//! # Cast Provider
//!
//! Remote playback on a cast receiver.
//!
//! ## Overview
//!
//! This module provides:
//! - [`CastCoordinator`], the session state machine moving playback between
//!   the local adapter and the receiver
//! - [`CastAdapter`], mirroring the receiver's player into canonical events
//! - [`CastLoader`], which claims sources while a session is connected
//! - Load-request building and the session error-code table
//!
//! ## Wiring
//!
//! ```ignore
//! let coordinator = CastCoordinator::new(cast_context, ctx.delegate.clone());
//! let registry = LoaderRegistry::new()
//!     .with(Arc::new(CastLoader::new(coordinator.clone())))
//!     .with(Arc::new(VideoLoader::new(ctx.clone())));
//! let runtime = Arc::new(ProviderRuntime::new(ctx, registry));
//! let handoff: Arc<dyn PlaybackHandoff> = runtime.clone();
//! coordinator.bind_handoff(Arc::downgrade(&handoff));
//! coordinator.attach();
//! ```

pub mod adapter;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod media_info;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use adapter::{classify_stream_type, CastAdapter, ReloadInfo};
pub use coordinator::{CastCoordinator, LocalSnapshot, SavedState};
pub use error::{cast_error_message, CastError, Result};
pub use loader::CastLoader;
pub use media_info::{build_load_request, StartPosition};
