//! Notify boundary between providers and consumers.
//!
//! Providers never mutate [`MediaState`] themselves. Every canonical event goes
//! through [`MediaDelegate::notify`], which folds it into the store, hands the
//! borrowed event (trigger chain included) to synchronous listeners and then
//! broadcasts an owned record on the event bus.

use bridge_traits::surface::ListenerId;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{EventBus, EventRecord, MediaEvent, MediaEventKind, Trigger};
use core_runtime::state::{MediaState, MediaStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub type MediaListener = Arc<dyn Fn(&MediaEvent<'_>) + Send + Sync>;

pub struct MediaDelegate {
    store: MediaStore,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    listeners: Mutex<Vec<(ListenerId, MediaListener)>>,
    next_id: AtomicU64,
}

impl MediaDelegate {
    pub fn new(bus_capacity: usize) -> Self {
        Self::with_clock(bus_capacity, Arc::new(SystemClock))
    }

    /// Event records are stamped with `clock`.
    pub fn with_clock(bus_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: MediaStore::new(),
            bus: EventBus::new(bus_capacity),
            clock,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn snapshot(&self) -> MediaState {
        self.store.snapshot()
    }

    pub fn add_listener(&self, listener: MediaListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Dispatch a canonical event. Listeners may re-enter `notify`.
    pub fn notify(&self, provider: Option<&str>, event: &MediaEvent<'_>) {
        tracing::trace!(
            event = event.event_type().as_str(),
            provider = provider.unwrap_or("-"),
            "notify"
        );
        self.store.apply(&event.kind);

        let listeners: Vec<MediaListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }

        // No subscribers is not an error.
        let record = EventRecord::from_event(event, provider).at(self.clock.now());
        let _ = self.bus.emit(record);
    }
}

impl std::fmt::Debug for MediaDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDelegate")
            .field("listeners", &self.listeners.lock().len())
            .field("bus", &self.bus)
            .finish()
    }
}

/// An adapter's handle onto the delegate.
///
/// Revoked on `destroy()`; a revoked notifier drops every event, so a torn
/// down adapter can never publish again even if a late callback fires.
#[derive(Clone)]
pub struct ProviderNotifier {
    delegate: Arc<MediaDelegate>,
    provider: &'static str,
    active: Arc<AtomicBool>,
}

impl ProviderNotifier {
    pub fn new(delegate: Arc<MediaDelegate>, provider: &'static str) -> Self {
        Self {
            delegate,
            provider,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn delegate(&self) -> &Arc<MediaDelegate> {
        &self.delegate
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn notify(&self, kind: MediaEventKind, trigger: Option<Trigger<'_>>) {
        let event = MediaEvent::new(kind).with_trigger(trigger);
        self.dispatch(&event);
    }

    /// Dispatch a pre-built event, so callers can chain later events onto it.
    pub fn dispatch(&self, event: &MediaEvent<'_>) {
        if !self.is_active() {
            tracing::trace!(
                provider = self.provider,
                event = event.event_type().as_str(),
                "dropped event from revoked provider"
            );
            return;
        }
        self.delegate.notify(Some(self.provider), event);
    }
}

impl std::fmt::Debug for ProviderNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderNotifier")
            .field("provider", &self.provider)
            .field("active", &self.is_active())
            .finish()
    }
}
