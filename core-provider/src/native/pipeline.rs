//! # Native Event Normalization
//!
//! Maps a media element's native event stream onto canonical events.
//!
//! ## Listener tiers
//!
//! | Tier | Attached | Native events |
//! |------|----------|---------------|
//! | `Initial` | on setup | loadstart, abort, emptied, error |
//! | `Loading` | after loadstart | loadeddata, loadedmetadata, canplay, canplaythrough, durationchange, play, progress, stalled, suspend |
//! | `Ready` | after loadedmetadata | pause, playing, ratechange, seeked, seeking, ended, volumechange, waiting, timeupdate |
//!
//! The `Loading` and `Ready` tiers are dropped whenever the adapter switches
//! source, so no listener survives a reload. While playing, current time is
//! polled per frame and only changed values are published.

use crate::delegate::ProviderNotifier;
use crate::frame_loop::FrameLoop;
use bridge_traits::{FrameScheduler, ListenerId, MediaElement, NativeEvent, NativeEventKind};
use core_runtime::events::{
    CanPlayDetail, MediaErrorDetail, MediaEvent, MediaEventKind, ProgressDetail, StreamType,
    TimeUpdateDetail, Trigger, VolumeDetail,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTier {
    Initial,
    Loading,
    Ready,
}

impl ListenerTier {
    pub fn events(&self) -> &'static [NativeEventKind] {
        match self {
            ListenerTier::Initial => &[
                NativeEventKind::LoadStart,
                NativeEventKind::Abort,
                NativeEventKind::Emptied,
                NativeEventKind::Error,
            ],
            ListenerTier::Loading => &[
                NativeEventKind::LoadedData,
                NativeEventKind::LoadedMetadata,
                NativeEventKind::CanPlay,
                NativeEventKind::CanPlayThrough,
                NativeEventKind::DurationChange,
                NativeEventKind::Play,
                NativeEventKind::Progress,
                NativeEventKind::Stalled,
                NativeEventKind::Suspend,
            ],
            ListenerTier::Ready => &[
                NativeEventKind::Pause,
                NativeEventKind::Playing,
                NativeEventKind::RateChange,
                NativeEventKind::Seeked,
                NativeEventKind::Seeking,
                NativeEventKind::Ended,
                NativeEventKind::VolumeChange,
                NativeEventKind::Waiting,
                NativeEventKind::TimeUpdate,
            ],
        }
    }
}

#[derive(Default)]
struct TierListeners {
    initial: Vec<ListenerId>,
    loading: Vec<ListenerId>,
    ready: Vec<ListenerId>,
}

impl TierListeners {
    fn tier_mut(&mut self, tier: ListenerTier) -> &mut Vec<ListenerId> {
        match tier {
            ListenerTier::Initial => &mut self.initial,
            ListenerTier::Loading => &mut self.loading,
            ListenerTier::Ready => &mut self.ready,
        }
    }
}

struct PipelineInner {
    element: Arc<dyn MediaElement>,
    notifier: ProviderNotifier,
    frame_loop: FrameLoop,
    /// Derive stream type from duration at loadedmetadata.
    native_stream_type: bool,
    listeners: Mutex<TierListeners>,
    last_time: Mutex<Option<f64>>,
}

#[derive(Clone)]
pub struct NativePipeline {
    inner: Arc<PipelineInner>,
}

impl NativePipeline {
    pub fn new(
        element: Arc<dyn MediaElement>,
        notifier: ProviderNotifier,
        scheduler: Arc<dyn FrameScheduler>,
        native_stream_type: bool,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<PipelineInner>| {
            let tick = weak.clone();
            PipelineInner {
                element,
                notifier,
                frame_loop: FrameLoop::new(scheduler, move || {
                    if let Some(inner) = tick.upgrade() {
                        inner.poll_time();
                    }
                }),
                native_stream_type,
                listeners: Mutex::new(TierListeners::default()),
                last_time: Mutex::new(None),
            }
        });
        Self { inner }
    }

    /// Attach the initial tier. Idempotent.
    pub fn attach(&self) {
        self.inner.attach(ListenerTier::Initial);
    }

    pub fn is_attached(&self, tier: ListenerTier) -> bool {
        !self.inner.listeners.lock().tier_mut(tier).is_empty()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.frame_loop.is_running()
    }

    /// Forget the current binding: drop the loading and ready tiers and stop
    /// polling. The initial tier stays attached.
    pub fn reset(&self) {
        self.inner.frame_loop.stop();
        self.inner.detach(ListenerTier::Ready);
        self.inner.detach(ListenerTier::Loading);
        *self.inner.last_time.lock() = None;
    }

    /// Remove every listener. Safe to call repeatedly.
    pub fn detach_all(&self) {
        self.reset();
        self.inner.detach(ListenerTier::Initial);
    }
}

impl std::fmt::Debug for NativePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePipeline")
            .field("provider", &self.inner.notifier.provider())
            .field("polling", &self.is_polling())
            .finish()
    }
}

impl PipelineInner {
    fn attach(self: &Arc<Self>, tier: ListenerTier) {
        if !self.listeners.lock().tier_mut(tier).is_empty() {
            return;
        }

        let ids: Vec<ListenerId> = tier
            .events()
            .iter()
            .map(|kind| {
                let weak = Arc::downgrade(self);
                self.element.add_event_listener(
                    *kind,
                    Arc::new(move |event: &NativeEvent| {
                        if let Some(inner) = weak.upgrade() {
                            inner.handle(event);
                        }
                    }),
                )
            })
            .collect();

        *self.listeners.lock().tier_mut(tier) = ids;
        debug!(provider = self.notifier.provider(), tier = ?tier, "attached listener tier");
    }

    fn detach(&self, tier: ListenerTier) {
        let ids = std::mem::take(self.listeners.lock().tier_mut(tier));
        if ids.is_empty() {
            return;
        }
        for id in ids {
            self.element.remove_event_listener(id);
        }
        debug!(provider = self.notifier.provider(), tier = ?tier, "detached listener tier");
    }

    fn handle(self: &Arc<Self>, event: &NativeEvent) {
        let trigger = Some(Trigger::Native(event));
        match event.kind {
            NativeEventKind::LoadStart => {
                self.attach(ListenerTier::Loading);
                self.notifier.notify(MediaEventKind::LoadStart, trigger);
            }
            NativeEventKind::Abort => self.notifier.notify(MediaEventKind::Abort, trigger),
            NativeEventKind::Emptied => self.notifier.notify(MediaEventKind::Emptied, trigger),
            NativeEventKind::Error => self.on_error(event),
            NativeEventKind::LoadedData => {
                self.notifier.notify(MediaEventKind::LoadedData, trigger)
            }
            NativeEventKind::LoadedMetadata => self.on_loaded_metadata(event),
            NativeEventKind::CanPlay => self
                .notifier
                .notify(MediaEventKind::CanPlay(self.can_play_detail()), trigger),
            NativeEventKind::CanPlayThrough => self
                .notifier
                .notify(MediaEventKind::CanPlayThrough(self.can_play_detail()), trigger),
            NativeEventKind::DurationChange => self.notifier.notify(
                MediaEventKind::DurationChange {
                    duration: self.element.duration(),
                },
                trigger,
            ),
            NativeEventKind::Play => self.notifier.notify(MediaEventKind::Play, trigger),
            NativeEventKind::Progress => self.notifier.notify(
                MediaEventKind::Progress(ProgressDetail {
                    buffered: self.element.buffered(),
                    seekable: self.element.seekable(),
                }),
                trigger,
            ),
            NativeEventKind::Stalled => self.notifier.notify(MediaEventKind::Stalled, trigger),
            NativeEventKind::Suspend => self.notifier.notify(MediaEventKind::Suspend, trigger),
            NativeEventKind::Playing => {
                self.notifier.notify(MediaEventKind::Playing, trigger);
                self.frame_loop.start();
            }
            NativeEventKind::Pause => {
                self.frame_loop.stop();
                self.notifier.notify(MediaEventKind::Pause, trigger);
            }
            NativeEventKind::RateChange => self.notifier.notify(
                MediaEventKind::RateChange {
                    rate: self.element.playback_rate(),
                },
                trigger,
            ),
            NativeEventKind::Seeking => self.notifier.notify(
                MediaEventKind::Seeking {
                    time: self.element.current_time(),
                },
                trigger,
            ),
            NativeEventKind::Seeked => self.on_seeked(event),
            NativeEventKind::Ended => {
                self.frame_loop.stop();
                self.notifier.notify(MediaEventKind::Ended, trigger);
            }
            NativeEventKind::VolumeChange => {
                self.notifier.notify(self.volume_kind(), trigger);
            }
            NativeEventKind::Waiting => self.notifier.notify(MediaEventKind::Waiting, trigger),
            NativeEventKind::TimeUpdate => {
                self.publish_time(self.element.current_time(), trigger)
            }
            other => trace!(event = other.name(), "ignored native event"),
        }
    }

    fn on_error(&self, event: &NativeEvent) {
        // Engines sometimes fire error without an error object.
        let Some(native) = self.element.error() else {
            trace!(provider = self.notifier.provider(), "dropped empty native error");
            return;
        };
        self.notifier.notify(
            MediaEventKind::Error(MediaErrorDetail::from_native(native)),
            Some(Trigger::Native(event)),
        );
    }

    fn on_loaded_metadata(self: &Arc<Self>, event: &NativeEvent) {
        self.attach(ListenerTier::Ready);

        // volume-change precedes loaded-metadata on every initial load.
        let trigger = Some(Trigger::Native(event));
        self.notifier.notify(self.volume_kind(), trigger);

        if self.native_stream_type {
            let stream_type = if self.element.duration().is_infinite() {
                StreamType::Live
            } else {
                StreamType::OnDemand
            };
            self.notifier
                .notify(MediaEventKind::StreamTypeChange { stream_type }, trigger);
        }

        self.notifier
            .notify(MediaEventKind::LoadedMetadata(self.can_play_detail()), trigger);
    }

    fn on_seeked(&self, event: &NativeEvent) {
        let time = self.element.current_time();
        let duration = self.element.duration();
        let seeked = MediaEvent::new(MediaEventKind::Seeked { time })
            .triggered_by(Trigger::Native(event));
        self.notifier.dispatch(&seeked);

        if should_snap_to_end(time, duration) {
            self.publish_time(duration, Some(Trigger::Media(&seeked)));
            if !self.element.ended() {
                self.resume_to_end();
            }
        } else {
            self.publish_time(time, Some(Trigger::Media(&seeked)));
        }
    }

    /// Nudge playback so the element reaches its real end and fires `ended`.
    fn resume_to_end(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime; skipping end-of-media resume");
            return;
        };
        let element = Arc::clone(&self.element);
        let notifier = self.notifier.clone();
        runtime.spawn(async move {
            if let Err(err) = element.play().await {
                notifier.notify(
                    MediaEventKind::Error(MediaErrorDetail::new(err.to_string(), None)),
                    None,
                );
            }
        });
    }

    fn poll_time(&self) {
        self.publish_time(self.element.current_time(), None);
    }

    fn publish_time(&self, time: f64, trigger: Option<Trigger<'_>>) {
        if time.is_nan() {
            return;
        }
        {
            let mut last = self.last_time.lock();
            if *last == Some(time) {
                return;
            }
            *last = Some(time);
        }
        self.notifier.notify(
            MediaEventKind::TimeUpdate(TimeUpdateDetail {
                current_time: time,
                played: self.element.played(),
            }),
            trigger,
        );
    }

    fn volume_kind(&self) -> MediaEventKind {
        MediaEventKind::VolumeChange(VolumeDetail {
            volume: self.element.volume(),
            muted: self.element.muted(),
        })
    }

    fn can_play_detail(&self) -> CanPlayDetail {
        CanPlayDetail {
            duration: self.element.duration(),
            buffered: self.element.buffered(),
            seekable: self.element.seekable(),
        }
    }
}

fn decimal_places(value: f64) -> usize {
    let repr = value.to_string();
    repr.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0)
}

/// Whether a seek that landed at `time` should publish `duration` instead.
///
/// Elements round the reported position, so a seek to the very end can stop
/// one rounding unit short of a more precise duration and never fire
/// `ended`.
pub fn should_snap_to_end(time: f64, duration: f64) -> bool {
    if !time.is_finite() || !duration.is_finite() || time > duration {
        return false;
    }
    let time_places = decimal_places(time);
    if decimal_places(duration) <= time_places {
        return false;
    }
    let unit = 10f64.powi(-(time_places as i32));
    duration - time < unit
}
