//! Memoized environment capability probes.
//!
//! Questions such as "can this host run a media-source engine" are answered
//! once and cached here. The probes travel in the provider context instead of
//! living in module globals.

use bridge_traits::MediaElement;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

type Probe = Box<dyn Fn() -> bool + Send + Sync>;

#[derive(Default)]
pub struct CapabilityProbes {
    media_source_probe: Option<Probe>,
    media_source: OnceLock<bool>,
    native_hls: OnceLock<bool>,
    custom: Mutex<HashMap<&'static str, bool>>,
}

impl CapabilityProbes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host check for media-source extensions; without one the answer is a
    /// best-effort `true` and hard failures surface when the engine loads.
    pub fn with_media_source(mut self, probe: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.media_source_probe = Some(Box::new(probe));
        self
    }

    pub fn supports_media_source(&self) -> bool {
        *self.media_source.get_or_init(|| {
            self.media_source_probe
                .as_ref()
                .map(|probe| probe())
                .unwrap_or(true)
        })
    }

    /// Whether the element plays HLS without an engine. Probed against the
    /// first element asked about.
    pub fn supports_native_hls(&self, element: &dyn MediaElement) -> bool {
        *self
            .native_hls
            .get_or_init(|| element.can_play_type(HLS_MIME_TYPE))
    }

    /// Memoize an arbitrary named probe.
    pub fn probe(&self, key: &'static str, check: impl FnOnce() -> bool) -> bool {
        if let Some(cached) = self.custom.lock().get(key) {
            return *cached;
        }
        let result = check();
        *self.custom.lock().entry(key).or_insert(result)
    }
}

impl std::fmt::Debug for CapabilityProbes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityProbes")
            .field("media_source", &self.media_source.get())
            .field("native_hls", &self.native_hls.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ElementProps, MockMediaElement};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn media_source_probe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let probes = CapabilityProbes::new().with_media_source(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        assert!(!probes.supports_media_source());
        assert!(!probes.supports_media_source());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_probe_is_best_effort_true() {
        assert!(CapabilityProbes::new().supports_media_source());
    }

    #[test]
    fn native_hls_probe_is_cached() {
        let probes = CapabilityProbes::new();
        let element = MockMediaElement::with_props(ElementProps {
            native_hls: true,
            ..Default::default()
        });
        assert!(probes.supports_native_hls(element.as_ref()));

        element.update(|p| p.native_hls = false);
        assert!(probes.supports_native_hls(element.as_ref()));
    }

    #[test]
    fn custom_probe_memoized() {
        let probes = CapabilityProbes::new();
        assert!(probes.probe("engine", || true));
        assert!(probes.probe("engine", || false));
    }
}
