//! Adapter mirroring the receiver's player into canonical events.
//!
//! Receiver properties arrive as remote-player change notifications and are
//! republished with the remote event as trigger. Current time is polled per
//! frame while the receiver plays.

use crate::coordinator::{spawn_detached, CastCoordinator, LocalSnapshot, SavedState};
use crate::error::CastError;
use crate::media_info::{build_load_request, StartPosition};
use async_trait::async_trait;
use bridge_traits::cast::RemotePlayerListener;
use bridge_traits::{
    NativeEvent, NativeEventKind, Preload, RemotePlayer, RemotePlayerEventKind,
    RemotePlayerState, RemoteStreamType, TimeRanges,
};
use core_provider::disposal::DisposalBin;
use core_provider::frame_loop::FrameLoop;
use core_provider::{
    ProviderAdapter, ProviderContext, ProviderError, ProviderNotifier, Result, Source,
};
use core_runtime::config::LOADER_GOOGLE_CAST;
use core_runtime::events::{
    CanPlayDetail, MediaEventKind, StreamType, TimeUpdateDetail, Trigger, VolumeDetail,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

const VOLUME_EPSILON: f64 = 0.001;

const OBSERVED: &[RemotePlayerEventKind] = &[
    RemotePlayerEventKind::IsPausedChanged,
    RemotePlayerEventKind::PlayerStateChanged,
    RemotePlayerEventKind::IsMediaLoadedChanged,
    RemotePlayerEventKind::DurationChanged,
    RemotePlayerEventKind::VolumeLevelChanged,
    RemotePlayerEventKind::IsMutedChanged,
    RemotePlayerEventKind::CanSeekChanged,
    RemotePlayerEventKind::LiveSeekableRangeChanged,
];

/// State captured before a forced receiver reload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadInfo {
    pub src: String,
    pub paused: bool,
    pub time: f64,
}

#[derive(Debug, Default)]
struct CastState {
    setup: bool,
    destroyed: bool,
    current_src: Option<Source>,
    reload: Option<ReloadInfo>,
    announced: bool,
    last_time: Option<f64>,
    played_end: f64,
    stream_type: StreamType,
}

/// Receiver stream type, upgraded to DVR when the live window is seekable.
pub fn classify_stream_type(player: &dyn RemotePlayer) -> StreamType {
    match player.stream_type() {
        Some(RemoteStreamType::Live) if player.can_seek() => StreamType::LiveDvr,
        Some(RemoteStreamType::Live) => StreamType::Live,
        Some(RemoteStreamType::Buffered) => StreamType::OnDemand,
        Some(RemoteStreamType::Other) | None => StreamType::Unknown,
    }
}

pub struct CastAdapter {
    ctx: ProviderContext,
    coordinator: Arc<CastCoordinator>,
    player: Arc<dyn RemotePlayer>,
    notifier: ProviderNotifier,
    scope: DisposalBin,
    time_sync: FrameLoop,
    state: Mutex<CastState>,
    generation: AtomicU64,
    weak_self: Weak<CastAdapter>,
}

impl CastAdapter {
    pub fn new(ctx: ProviderContext, coordinator: Arc<CastCoordinator>) -> Arc<Self> {
        let player = coordinator.remote_player();
        let notifier = ProviderNotifier::new(Arc::clone(&ctx.delegate), LOADER_GOOGLE_CAST);
        Arc::new_cyclic(|weak_self: &Weak<CastAdapter>| {
            let tick = weak_self.clone();
            let time_sync = FrameLoop::new(Arc::clone(&ctx.frame_scheduler), move || {
                if let Some(adapter) = tick.upgrade() {
                    adapter.sync_time();
                }
            });
            Self {
                ctx,
                coordinator,
                player,
                notifier,
                scope: DisposalBin::new(),
                time_sync,
                state: Mutex::new(CastState::default()),
                generation: AtomicU64::new(0),
                weak_self: weak_self.clone(),
            }
        })
    }

    pub fn reload_info(&self) -> Option<ReloadInfo> {
        self.state.lock().reload.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.time_sync.is_running()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// One time-sync step: publish the receiver time if it moved.
    pub fn sync_time(&self) {
        let time = self.player.current_time();
        let played_end = {
            let mut state = self.state.lock();
            // Receivers report transient zeros while swapping media.
            if state.destroyed || state.reload.is_some() {
                return;
            }
            if !time.is_finite() || state.last_time == Some(time) {
                return;
            }
            state.last_time = Some(time);
            state.played_end = state.played_end.max(time);
            state.played_end
        };
        self.coordinator.record_observation(SavedState {
            paused: self.player.is_paused(),
            time,
        });
        self.notifier.notify(
            MediaEventKind::TimeUpdate(TimeUpdateDetail {
                current_time: time,
                played: TimeRanges::single(0.0, played_end),
            }),
            None,
        );
    }

    /// Push the current track list to the receiver by reloading the media at
    /// the receiver's current position.
    pub async fn reload_tracks(&self) -> Result<()> {
        let source = {
            let state = self.state.lock();
            match (&state.current_src, state.destroyed) {
                (Some(source), false) => source.clone(),
                _ => return Ok(()),
            }
        };
        let Some(src) = source.src().map(str::to_string) else {
            return Ok(());
        };
        if !self.coordinator.is_connected() {
            return Ok(());
        }

        let info = ReloadInfo {
            src,
            paused: self.player.is_paused(),
            time: self.player.current_time(),
        };
        debug!(time = info.time, paused = info.paused, "reloading receiver media");
        self.state.lock().reload = Some(info);
        self.time_sync.stop();
        self.load_source(&source, self.ctx.settings.preload).await
    }

    fn subscribe(&self) {
        for kind in OBSERVED {
            let weak = self.weak_self.clone();
            let listener: RemotePlayerListener = Arc::new(move |kind| {
                if let Some(adapter) = weak.upgrade() {
                    adapter.on_remote_event(kind);
                }
            });
            let id = self.player.add_listener(*kind, listener);
            let player = Arc::clone(&self.player);
            self.scope.add(move || player.remove_listener(id));
        }

        let weak = self.weak_self.clone();
        let id = self.ctx.text_tracks.subscribe(Arc::new(move |change| {
            debug!(change = ?change, "text tracks changed while casting");
            let Some(adapter) = weak.upgrade() else {
                return;
            };
            spawn_detached(async move {
                if let Err(err) = adapter.reload_tracks().await {
                    debug!(error = %err, "track reload did not complete");
                }
            });
        }));
        let tracks = Arc::clone(&self.ctx.text_tracks);
        self.scope.add(move || tracks.unsubscribe(id));
    }

    fn on_remote_event(&self, kind: RemotePlayerEventKind) {
        let native = NativeEvent::new(NativeEventKind::Remote(kind.name()));
        let trigger = Some(Trigger::Native(&native));
        match kind {
            RemotePlayerEventKind::IsPausedChanged => {
                if self.player.is_paused() {
                    self.time_sync.stop();
                    self.notifier.notify(MediaEventKind::Pause, trigger);
                } else {
                    self.notifier.notify(MediaEventKind::Play, trigger);
                    self.time_sync.start();
                }
            }
            RemotePlayerEventKind::PlayerStateChanged => match self.player.player_state() {
                RemotePlayerState::Playing => {
                    self.notifier.notify(MediaEventKind::Playing, trigger);
                    self.time_sync.start();
                }
                RemotePlayerState::Buffering => {
                    self.notifier.notify(MediaEventKind::Waiting, trigger)
                }
                RemotePlayerState::Idle | RemotePlayerState::Paused => {}
            },
            RemotePlayerEventKind::IsMediaLoadedChanged => {
                if self.player.is_media_loaded() && !self.is_reloading() {
                    self.announce_loaded(trigger);
                }
            }
            RemotePlayerEventKind::DurationChanged => {
                if !self.is_reloading() {
                    self.notifier.notify(
                        MediaEventKind::DurationChange {
                            duration: self.player.duration(),
                        },
                        trigger,
                    );
                }
            }
            RemotePlayerEventKind::VolumeLevelChanged | RemotePlayerEventKind::IsMutedChanged => {
                self.notify_volume(trigger)
            }
            RemotePlayerEventKind::CanSeekChanged
            | RemotePlayerEventKind::LiveSeekableRangeChanged => self.update_stream_type(trigger),
            RemotePlayerEventKind::IsConnectedChanged
            | RemotePlayerEventKind::CanControlVolumeChanged => {}
        }
    }

    fn is_reloading(&self) -> bool {
        self.state.lock().reload.is_some()
    }

    fn notify_volume(&self, trigger: Option<Trigger<'_>>) {
        self.notifier.notify(
            MediaEventKind::VolumeChange(VolumeDetail {
                volume: self.player.volume_level(),
                muted: self.player.is_muted(),
            }),
            trigger,
        );
    }

    fn update_stream_type(&self, trigger: Option<Trigger<'_>>) {
        let next = classify_stream_type(self.player.as_ref());
        let changed = {
            let mut state = self.state.lock();
            let changed = state.stream_type != next;
            state.stream_type = next;
            changed
        };
        if changed && next != StreamType::Unknown {
            self.notifier
                .notify(MediaEventKind::StreamTypeChange { stream_type: next }, trigger);
        }
    }

    /// Publish the loaded receiver media once per load.
    fn announce_loaded(&self, trigger: Option<Trigger<'_>>) {
        {
            let mut state = self.state.lock();
            if state.announced || state.current_src.is_none() {
                return;
            }
            state.announced = true;
        }
        let duration = self.player.duration();
        let seekable = match self.player.live_seekable_range() {
            Some((start, end)) => TimeRanges::single(start, end),
            None if duration.is_finite() && duration > 0.0 => TimeRanges::single(0.0, duration),
            None => TimeRanges::empty(),
        };
        let detail = CanPlayDetail {
            duration,
            buffered: TimeRanges::empty(),
            seekable,
        };

        self.notify_volume(trigger);
        self.update_stream_type(trigger);
        self.notifier
            .notify(MediaEventKind::LoadedMetadata(detail.clone()), trigger);
        self.notifier.notify(MediaEventKind::CanPlay(detail), trigger);
    }

    fn apply_local_volume(&self, local: &LocalSnapshot) {
        if self.player.is_muted() != local.muted {
            self.player.mute_or_unmute();
        }
        if self.player.can_control_volume()
            && (self.player.volume_level() - local.volume).abs() > VOLUME_EPSILON
        {
            self.player.set_volume_level(local.volume.clamp(0.0, 1.0));
        }
    }

    /// Continue a session already serving the source. Never seeks backwards.
    fn resume_session(&self, local: Option<&LocalSnapshot>) {
        let remote_time = self.player.current_time();
        if let Some(local) = local {
            let time = remote_time.max(local.time);
            if time > remote_time {
                self.player.seek(time);
            }
            self.apply_local_volume(local);
            if !local.paused && self.player.is_paused() {
                self.player.play_or_pause();
            }
        }
        info!(time = remote_time, "resumed existing cast session");
        if !self.player.is_paused() || local.map(|l| !l.paused).unwrap_or(false) {
            self.time_sync.start();
        }
    }

    fn fail(&self, error: ProviderError) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.current_src = None;
            state.reload = None;
        }
        if !error.is_race_lost() {
            self.notifier
                .notify(MediaEventKind::Error(error.to_detail()), None);
        }
        Err(error)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.coordinator.is_connected() {
            Ok(())
        } else {
            Err(CastError::NoSession.into())
        }
    }
}

#[async_trait]
impl ProviderAdapter for CastAdapter {
    fn kind(&self) -> &'static str {
        LOADER_GOOGLE_CAST
    }

    fn scope(&self) -> &DisposalBin {
        &self.scope
    }

    fn current_src(&self) -> Option<Source> {
        self.state.lock().current_src.clone()
    }

    async fn setup(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(ProviderError::Destroyed);
            }
            if state.setup {
                return Ok(());
            }
            state.setup = true;
        }
        self.subscribe();
        info!(provider = LOADER_GOOGLE_CAST, "provider setup");
        self.notifier.notify(
            MediaEventKind::ProviderSetup {
                provider: LOADER_GOOGLE_CAST.to_string(),
            },
            None,
        );
        Ok(())
    }

    async fn destroy(&self) {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.reload = None;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.notifier.revoke();
        self.time_sync.stop();
        self.scope.empty();
        debug!("cast adapter destroyed");
    }

    async fn play(&self) -> Result<()> {
        if let Err(err) = self.ensure_connected() {
            self.notifier
                .notify(MediaEventKind::Error(err.to_detail()), None);
            return Err(err);
        }
        if self.player.is_paused() {
            self.player.play_or_pause();
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if let Err(err) = self.ensure_connected() {
            self.notifier
                .notify(MediaEventKind::Error(err.to_detail()), None);
            return Err(err);
        }
        if !self.player.is_paused() {
            self.player.play_or_pause();
        }
        Ok(())
    }

    fn set_muted(&self, muted: bool) {
        if self.player.is_muted() != muted {
            self.player.mute_or_unmute();
        }
    }

    fn set_current_time(&self, time: f64) {
        self.player.seek(time.max(0.0));
    }

    fn set_volume(&self, volume: f64) {
        if self.player.can_control_volume() {
            self.player.set_volume_level(volume.clamp(0.0, 1.0));
        }
    }

    #[instrument(skip(self, source, _preload), fields(source = %source))]
    async fn load_source(&self, source: &Source, _preload: Preload) -> Result<()> {
        let Some(src) = source.src().map(str::to_string) else {
            return self.fail(CastError::StreamSource.into());
        };

        let (generation, reload) = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(ProviderError::Destroyed);
            }
            // Reload info belongs to the source it was captured for.
            if state.reload.as_ref().map(|r| r.src != src).unwrap_or(false) {
                state.reload = None;
            }
            let reload = state.reload.clone();
            if reload.is_none() && state.current_src.as_ref() == Some(source) {
                return Ok(());
            }
            let previous = state.current_src.replace(source.clone());
            if previous.as_ref().and_then(Source::src) != Some(src.as_str()) {
                state.last_time = None;
                state.played_end = 0.0;
                state.stream_type = StreamType::Unknown;
            }
            state.announced = false;
            (self.generation.fetch_add(1, Ordering::AcqRel) + 1, reload)
        };

        let Some(session) = self.coordinator.cast_context().current_session() else {
            return self.fail(CastError::NoSession.into());
        };
        let local = self.coordinator.take_local_snapshot(&src);

        if reload.is_none() && session.media_content_id().as_deref() == Some(src.as_str()) {
            self.resume_session(local.as_ref());
            self.announce_loaded(None);
            return Ok(());
        }

        let start = match (&reload, &local) {
            (Some(info), _) => StartPosition {
                time: info.time,
                autoplay: !info.paused,
            },
            (None, Some(local)) => StartPosition {
                time: local.time,
                autoplay: !local.paused,
            },
            (None, None) => StartPosition {
                time: 0.0,
                autoplay: false,
            },
        };
        let stream_type = self.ctx.delegate.store().read(|media| media.stream_type);
        let tracks = self.ctx.text_tracks.tracks();
        let metadata = self.ctx.metadata.read().clone();
        let request = match build_load_request(source, stream_type, &tracks, &metadata, start) {
            Ok(request) => request,
            Err(err) => return self.fail(err.into()),
        };

        debug!(time = start.time, autoplay = start.autoplay, "loading media on receiver");
        let outcome = session.load_media(request).await;

        if self.generation.load(Ordering::Acquire) != generation || self.is_destroyed() {
            return Err(ProviderError::RaceLost);
        }
        if let Some(code) = outcome {
            warn!(code = %code, "receiver failed to load media");
            return self.fail(CastError::from_code(code).into());
        }

        self.state.lock().reload = None;
        if let Some(local) = &local {
            self.apply_local_volume(local);
        }
        self.announce_loaded(None);
        if start.autoplay {
            self.time_sync.start();
        }
        Ok(())
    }
}

impl std::fmt::Debug for CastAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CastAdapter")
            .field("current_src", &state.current_src)
            .field("reloading", &state.reload.is_some())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
