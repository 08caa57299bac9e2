//! Script Host Abstraction
//!
//! Backends such as adaptive-streaming engines ship as external runtime
//! libraries. On the web they are `<script>` tags that register a global; in a
//! native host they may be plugins registered into a symbol table. Either way
//! the core asks the host to load a locator and then looks the expected symbol
//! up by name.

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

use crate::error::Result;

/// A value published into the host's global scope by a loaded script.
pub type GlobalValue = Arc<dyn Any + Send + Sync>;

#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Fetch and evaluate the script at `url`.
    ///
    /// Resolves once the script has run. Implementations are not required to
    /// de-duplicate requests; the core's library loader does that.
    async fn load_script(&self, url: &str) -> Result<()>;

    /// Look up a global symbol registered by a previously evaluated script.
    fn global(&self, symbol: &str) -> Option<GlobalValue>;

    /// Hint that `url` will be needed soon (DNS/TLS warm-up).
    fn preconnect(&self, _url: &str) {}

    /// `false` when running without a real playback environment, e.g. while
    /// rendering on a server.
    fn is_interactive(&self) -> bool {
        true
    }
}
