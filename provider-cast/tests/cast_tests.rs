use async_trait::async_trait;
use bridge_traits::{
    CastErrorCode, CastSessionState, Preload, RemotePlayerEventKind,
    RemoteStreamType, TimeRanges,
};
use core_provider::testing::{ManualFrameScheduler, MockMediaElement};
use core_provider::tracks::{TextTrack, TextTrackKind, TextTrackMode};
use core_provider::{
    LoaderRegistry, PlaybackHandoff, ProviderAdapter, ProviderContext, ProviderError,
    ProviderLoader, ProviderRuntime, ResumePoint, Source, VideoLoader,
};
use core_runtime::config::RuntimeConfig;
use core_runtime::events::{
    EventRecord, MediaEvent, MediaEventKind, MediaEventType, Receiver, RemotePlaybackState,
    StreamType, TimeUpdateDetail, VolumeDetail,
};
use mockall::mock;
use provider_cast::testing::{MockCastContext, MockCastSession, MockRemotePlayer};
use provider_cast::{CastAdapter, CastCoordinator, CastError, CastLoader, SavedState};
use std::sync::Arc;

mock! {
    Handoff {}

    #[async_trait]
    impl PlaybackHandoff for Handoff {
        fn current_source(&self) -> Option<Source>;
        fn set_resume_point(&self, point: ResumePoint);
        async fn reselect(&self) -> core_provider::Result<()>;
    }
}

fn context() -> (ProviderContext, Arc<ManualFrameScheduler>) {
    let scheduler = Arc::new(ManualFrameScheduler::new());
    let config = RuntimeConfig::builder()
        .frame_scheduler(scheduler.clone())
        .build()
        .unwrap();
    (ProviderContext::from_config(&config), scheduler)
}

fn drain(rx: &mut Receiver<EventRecord>) -> Vec<EventRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

fn errors(records: &[EventRecord]) -> Vec<(String, bool)> {
    records
        .iter()
        .filter_map(|r| match &r.kind {
            MediaEventKind::Error(detail) => Some((detail.message.clone(), detail.code.is_none())),
            _ => None,
        })
        .collect()
}

fn time_updates(records: &[EventRecord]) -> Vec<TimeUpdateDetail> {
    records
        .iter()
        .filter_map(|r| match &r.kind {
            MediaEventKind::TimeUpdate(detail) => Some(detail.clone()),
            _ => None,
        })
        .collect()
}

fn remote_states(records: &[EventRecord]) -> Vec<(RemotePlaybackState, Option<String>)> {
    records
        .iter()
        .filter_map(|r| match &r.kind {
            MediaEventKind::RemotePlaybackChange(detail) => {
                Some((detail.state, detail.device.clone()))
            }
            _ => None,
        })
        .collect()
}

/// Let spawned session callbacks run to completion.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Local playback of `src` at `time`, as a local adapter would report it.
fn play_locally(ctx: &ProviderContext, src: &str, time: f64, muted: bool, volume: f64) {
    let notify = |kind| ctx.delegate.notify(Some("video"), &MediaEvent::new(kind));
    notify(MediaEventKind::SourceChange {
        src: Some(src.to_string()),
    });
    notify(MediaEventKind::Playing);
    notify(MediaEventKind::TimeUpdate(TimeUpdateDetail {
        current_time: time,
        played: TimeRanges::single(0.0, time),
    }));
    notify(MediaEventKind::VolumeChange(VolumeDetail { volume, muted }));
}

struct Harness {
    ctx: ProviderContext,
    cast: Arc<MockCastContext>,
    player: Arc<MockRemotePlayer>,
    session: Arc<MockCastSession>,
    coordinator: Arc<CastCoordinator>,
    adapter: Arc<CastAdapter>,
}

/// A connected session with a set-up cast adapter and no runtime bound.
async fn connected() -> Harness {
    let (ctx, _) = context();
    connected_with(ctx).await
}

async fn connected_with(ctx: ProviderContext) -> Harness {
    let cast = MockCastContext::new();
    let player = cast.player();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));
    coordinator
        .handle_session_state(CastSessionState::SessionStarting)
        .await;
    let session = cast.connect("Living Room");
    coordinator
        .handle_session_state(CastSessionState::SessionStarted)
        .await;

    let adapter = CastAdapter::new(ctx.clone(), Arc::clone(&coordinator));
    adapter.setup().await.unwrap();
    Harness {
        ctx,
        cast,
        player,
        session,
        coordinator,
        adapter,
    }
}

fn clip(src: &str) -> Source {
    Source::url(src, "video/mp4")
}

// ============================================================================
// Hand-off through the runtime
// ============================================================================

#[tokio::test]
async fn test_session_hands_playback_to_receiver_and_back() {
    let (ctx, scheduler) = context();
    let mut events = ctx.delegate.bus().subscribe();
    let cast = MockCastContext::new();
    let player = cast.player();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));

    let mut registry = LoaderRegistry::new();
    registry.register(Arc::new(CastLoader::new(Arc::clone(&coordinator))));
    registry.register(Arc::new(VideoLoader::new(ctx.clone())));
    let runtime = Arc::new(ProviderRuntime::new(ctx.clone(), registry));
    let handoff: Arc<dyn PlaybackHandoff> = runtime.clone();
    coordinator.bind_handoff(Arc::downgrade(&handoff));

    let element = MockMediaElement::new();
    runtime.mount(element.clone());
    runtime.load(clip("a.mp4")).await.unwrap();
    assert_eq!(runtime.adapter().map(|a| a.kind()), Some("video"));
    play_locally(&ctx, "a.mp4", 42.0, false, 1.0);

    coordinator
        .handle_session_state(CastSessionState::SessionStarting)
        .await;
    let session = cast.connect("Living Room");
    coordinator
        .handle_session_state(CastSessionState::SessionStarted)
        .await;

    assert_eq!(runtime.adapter().map(|a| a.kind()), Some("google-cast"));
    assert_eq!(element.total_listeners(), 0);
    let requests = session.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].media_info.src, "a.mp4");
    assert_eq!(requests[0].current_time, 42.0);
    assert!(requests[0].autoplay);

    let snapshot = ctx.delegate.snapshot();
    assert_eq!(snapshot.remote_playback_state, RemotePlaybackState::Connected);
    assert_eq!(snapshot.remote_device.as_deref(), Some("Living Room"));

    // Receiver moves on, then the session ends from the receiver side.
    player.update(|props| props.current_time = 80.0);
    scheduler.tick();
    assert_eq!(ctx.delegate.snapshot().current_time, 80.0);

    cast.drop_session();
    coordinator
        .handle_session_state(CastSessionState::SessionEnded)
        .await;

    assert_eq!(
        coordinator.saved_state(),
        Some(SavedState {
            paused: false,
            time: 80.0
        })
    );
    assert_eq!(runtime.adapter().map(|a| a.kind()), Some("video"));
    assert_eq!(element.props().current_time, 80.0);
    assert_eq!(element.play_calls(), 1);
    assert_eq!(player.listener_count(), 0);

    let states: Vec<RemotePlaybackState> = remote_states(&drain(&mut events))
        .into_iter()
        .map(|(state, _)| state)
        .collect();
    assert_eq!(
        states,
        vec![
            RemotePlaybackState::Connecting,
            RemotePlaybackState::Connected,
            RemotePlaybackState::Disconnected,
        ]
    );
}

// ============================================================================
// Coordinator
// ============================================================================

#[tokio::test]
async fn test_saved_state_falls_back_to_last_observation() {
    let (ctx, _) = context();
    let mut events = ctx.delegate.bus().subscribe();
    let cast = MockCastContext::new();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));

    let mut handoff = MockHandoff::new();
    handoff.expect_reselect().times(2).returning(|| Ok(()));
    handoff
        .expect_set_resume_point()
        .withf(|point| {
            *point
                == ResumePoint {
                    time: 12.5,
                    paused: true,
                }
        })
        .times(1)
        .return_const(());
    let handoff: Arc<dyn PlaybackHandoff> = Arc::new(handoff);
    coordinator.bind_handoff(Arc::downgrade(&handoff));

    coordinator
        .handle_session_state(CastSessionState::SessionStarting)
        .await;
    assert_eq!(coordinator.state(), RemotePlaybackState::Connecting);
    cast.connect("Kitchen");
    coordinator
        .handle_session_state(CastSessionState::SessionStarted)
        .await;
    assert_eq!(coordinator.device().as_deref(), Some("Kitchen"));

    coordinator.record_observation(SavedState {
        paused: true,
        time: 12.5,
    });
    // Receiver already dropped its media when the end is reported.
    cast.drop_session();
    coordinator
        .handle_session_state(CastSessionState::SessionEnded)
        .await;

    assert_eq!(coordinator.state(), RemotePlaybackState::Disconnected);
    assert_eq!(
        coordinator.saved_state(),
        Some(SavedState {
            paused: true,
            time: 12.5
        })
    );
    assert_eq!(
        remote_states(&drain(&mut events)),
        vec![
            (RemotePlaybackState::Connecting, None),
            (RemotePlaybackState::Connected, Some("Kitchen".to_string())),
            (RemotePlaybackState::Disconnected, None),
        ]
    );
}

#[tokio::test]
async fn test_failed_start_never_saves_state() {
    let (ctx, _) = context();
    let cast = MockCastContext::new();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));

    let mut handoff = MockHandoff::new();
    handoff.expect_reselect().never();
    handoff.expect_set_resume_point().never();
    let handoff: Arc<dyn PlaybackHandoff> = Arc::new(handoff);
    coordinator.bind_handoff(Arc::downgrade(&handoff));

    coordinator
        .handle_session_state(CastSessionState::SessionStarting)
        .await;
    coordinator
        .handle_session_state(CastSessionState::SessionStartFailed)
        .await;

    assert_eq!(coordinator.state(), RemotePlaybackState::Disconnected);
    assert_eq!(coordinator.saved_state(), None);
}

#[tokio::test]
async fn test_request_session_error_is_published() {
    let (ctx, _) = context();
    let mut events = ctx.delegate.bus().subscribe();
    let cast = MockCastContext::new();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));
    cast.fail_requests(Some(CastErrorCode::ReceiverUnavailable));

    let err = coordinator.request_session().await.unwrap_err();
    assert_eq!(err, CastError::from_code(CastErrorCode::ReceiverUnavailable));
    assert_eq!(
        errors(&drain(&mut events)),
        vec![(
            "No receiver was compatible with the session request.".to_string(),
            true
        )]
    );

    cast.set_available(false);
    assert_eq!(
        coordinator.request_session().await.unwrap_err(),
        CastError::NotAvailable
    );
}

#[tokio::test]
async fn test_end_session_leaves_receiver_playing() {
    let h = connected().await;
    h.coordinator.end_session().await;

    assert_eq!(h.cast.ended(), vec![false]);
    assert_eq!(h.coordinator.state(), RemotePlaybackState::Disconnected);
    assert!(h.coordinator.saved_state().is_some());
}

#[tokio::test]
async fn test_attach_follows_context_listeners() {
    let (ctx, _) = context();
    let cast = MockCastContext::new();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));

    coordinator.attach();
    coordinator.attach();
    assert_eq!(cast.listener_count(), 1);
    assert_eq!(cast.player().listener_count(), 1);

    cast.set_state(CastSessionState::SessionStarting);
    settle().await;
    assert_eq!(coordinator.state(), RemotePlaybackState::Connecting);

    cast.connect("Den");
    cast.player().emit(RemotePlayerEventKind::IsConnectedChanged);
    settle().await;
    assert!(coordinator.is_connected());

    coordinator.detach();
    assert_eq!(cast.listener_count(), 0);
    assert_eq!(cast.player().listener_count(), 0);
}

#[tokio::test]
async fn test_loader_accepts_only_while_connected() {
    let (ctx, _) = context();
    let cast = MockCastContext::new();
    let coordinator = CastCoordinator::new(cast.clone(), Arc::clone(&ctx.delegate));
    let loader = CastLoader::new(Arc::clone(&coordinator));

    assert!(!loader.can_play(&clip("a.mp4")));
    cast.connect("Den");
    coordinator
        .handle_session_state(CastSessionState::SessionResumed)
        .await;
    assert!(loader.can_play(&clip("a.mp4")));
    assert!(loader.can_play(&Source::untyped("https://a/master.m3u8")));
}

// ============================================================================
// Adapter
// ============================================================================

#[tokio::test]
async fn test_existing_session_is_resumed_not_reloaded() {
    let (ctx, _) = context();
    play_locally(&ctx, "a.mp4", 42.0, true, 0.5);
    let h = connected_with(ctx).await;
    h.session.set_content_id(Some("a.mp4"));
    h.player.update(|props| {
        props.media_loaded = true;
        props.current_time = 30.0;
        props.paused = true;
    });
    let mut events = h.ctx.delegate.bus().subscribe();

    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();

    assert!(h.session.requests().is_empty());
    assert_eq!(h.player.seeks(), vec![42.0]);
    let props = h.player.props();
    assert!(props.muted);
    assert_eq!(props.volume, 0.5);
    assert!(!props.paused);
    assert!(h.adapter.is_polling());

    let types: Vec<MediaEventType> = drain(&mut events).iter().map(|r| r.event_type).collect();
    assert!(types.contains(&MediaEventType::LoadedMetadata));
    assert!(types.contains(&MediaEventType::CanPlay));
}

#[tokio::test]
async fn test_resume_never_seeks_backwards() {
    let (ctx, _) = context();
    play_locally(&ctx, "a.mp4", 42.0, false, 1.0);
    let h = connected_with(ctx).await;
    h.session.set_content_id(Some("a.mp4"));
    h.player.update(|props| {
        props.media_loaded = true;
        props.current_time = 50.0;
        props.paused = false;
    });

    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();

    assert!(h.player.seeks().is_empty());
    assert_eq!(h.player.toggles(), 0);
    assert_eq!(h.player.mute_toggles(), 0);
}

#[tokio::test]
async fn test_load_failure_reports_table_message() {
    let h = connected().await;
    let mut events = h.ctx.delegate.bus().subscribe();
    h.session.fail_loads(Some(CastErrorCode::LoadMediaFailed));

    let err = h
        .adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap_err();

    assert_eq!(err.media_error_code(), None);
    assert!(h.adapter.current_src().is_none());
    assert_eq!(
        errors(&drain(&mut events)),
        vec![("Load media failed.".to_string(), true)]
    );
}

#[tokio::test]
async fn test_load_without_session_fails() {
    let (ctx, _) = context();
    let mut events = ctx.delegate.bus().subscribe();
    let cast = MockCastContext::new();
    let coordinator = CastCoordinator::new(cast, Arc::clone(&ctx.delegate));
    let adapter = CastAdapter::new(ctx, coordinator);
    adapter.setup().await.unwrap();

    let err = adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), CastError::NoSession.to_string());
    assert!(adapter.play().await.is_err());
    assert_eq!(errors(&drain(&mut events)).len(), 2);
}

#[tokio::test]
async fn test_track_change_reloads_at_receiver_position() {
    let h = connected().await;
    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();
    h.player.update(|props| {
        props.current_time = 42.0;
        props.paused = false;
    });

    h.ctx.text_tracks.add(
        TextTrack::new("en", TextTrackKind::Subtitles, "English")
            .with_src("https://a/en.vtt")
            .with_mode(TextTrackMode::Showing),
    );
    settle().await;

    let requests = h.session.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].current_time, 42.0);
    assert!(requests[1].autoplay);
    assert_eq!(requests[1].media_info.tracks.len(), 1);
    assert_eq!(requests[1].active_track_ids, vec![1]);
    assert!(h.adapter.reload_info().is_none());
    assert!(h.adapter.is_polling());
}

#[tokio::test]
async fn test_reload_suppresses_time_and_duration() {
    let h = connected().await;
    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();
    h.player.update(|props| {
        props.current_time = 42.0;
        props.paused = false;
    });
    let gate = h.session.gate_loads();
    let mut events = h.ctx.delegate.bus().subscribe();

    let (reloaded, _) = tokio::join!(h.adapter.reload_tracks(), async {
        tokio::task::yield_now().await;
        let info = h.adapter.reload_info().unwrap();
        assert_eq!(info.time, 42.0);
        assert!(!info.paused);
        assert!(!h.adapter.is_polling());

        h.player.update(|props| props.current_time = 0.0);
        h.adapter.sync_time();
        h.player.emit(RemotePlayerEventKind::DurationChanged);
        gate.notify_one();
    });
    reloaded.unwrap();

    let records = drain(&mut events);
    assert!(time_updates(&records).is_empty());
    assert!(records
        .iter()
        .all(|r| r.event_type != MediaEventType::DurationChange));
    assert_eq!(h.session.requests()[1].current_time, 42.0);
}

#[tokio::test]
async fn test_played_range_only_grows() {
    let h = connected().await;
    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();
    let mut events = h.ctx.delegate.bus().subscribe();

    for time in [10.0, 5.0, 5.0, 20.0] {
        h.player.update(|props| props.current_time = time);
        h.adapter.sync_time();
    }

    let updates = time_updates(&drain(&mut events));
    let observed: Vec<(f64, TimeRanges)> = updates
        .into_iter()
        .map(|u| (u.current_time, u.played))
        .collect();
    assert_eq!(
        observed,
        vec![
            (10.0, TimeRanges::single(0.0, 10.0)),
            (5.0, TimeRanges::single(0.0, 10.0)),
            (20.0, TimeRanges::single(0.0, 20.0)),
        ]
    );
}

#[tokio::test]
async fn test_live_stream_type_follows_seekability() {
    let h = connected().await;
    h.adapter
        .load_source(&clip("live.mp4"), Preload::Metadata)
        .await
        .unwrap();
    let mut events = h.ctx.delegate.bus().subscribe();

    h.player.update(|props| {
        props.stream_type = Some(RemoteStreamType::Live);
        props.can_seek = false;
    });
    h.player.emit(RemotePlayerEventKind::CanSeekChanged);
    h.player.update(|props| props.can_seek = true);
    h.player.emit(RemotePlayerEventKind::CanSeekChanged);

    let records = drain(&mut events);
    let stream_types: Vec<StreamType> = records
        .iter()
        .filter_map(|r| match r.kind {
            MediaEventKind::StreamTypeChange { stream_type } => Some(stream_type),
            _ => None,
        })
        .collect();
    assert_eq!(stream_types, vec![StreamType::Live, StreamType::LiveDvr]);
    assert!(records
        .iter()
        .all(|r| r.trigger_chain == vec!["canSeekChanged".to_string()]));
}

#[tokio::test]
async fn test_paused_changes_drive_time_sync() {
    let h = connected().await;
    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();
    let mut events = h.ctx.delegate.bus().subscribe();

    h.player.update(|props| props.paused = false);
    h.player.emit(RemotePlayerEventKind::IsPausedChanged);
    assert!(h.adapter.is_polling());
    h.player.update(|props| props.paused = true);
    h.player.emit(RemotePlayerEventKind::IsPausedChanged);
    assert!(!h.adapter.is_polling());

    let types: Vec<MediaEventType> = drain(&mut events).iter().map(|r| r.event_type).collect();
    assert_eq!(types, vec![MediaEventType::Play, MediaEventType::Pause]);
}

#[tokio::test]
async fn test_superseded_load_is_dropped() {
    let h = connected().await;
    let mut events = h.ctx.delegate.bus().subscribe();
    let gate = h.session.gate_loads();

    let slow_clip = clip("a.mp4");
    let (slow, fast) = tokio::join!(
        h.adapter.load_source(&slow_clip, Preload::Metadata),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
            h.adapter
                .load_source(&clip("b.mp4"), Preload::Metadata)
                .await
        }
    );

    assert_eq!(slow.unwrap_err(), ProviderError::RaceLost);
    fast.unwrap();
    assert_eq!(
        h.adapter.current_src().and_then(|s| s.src().map(str::to_string)),
        Some("b.mp4".to_string())
    );
    assert!(errors(&drain(&mut events)).is_empty());
}

#[tokio::test]
async fn test_destroyed_adapter_stays_silent() {
    let h = connected().await;
    h.adapter
        .load_source(&clip("a.mp4"), Preload::Metadata)
        .await
        .unwrap();
    h.adapter.destroy().await;
    let mut events = h.ctx.delegate.bus().subscribe();

    h.player.update(|props| props.paused = false);
    h.player.emit(RemotePlayerEventKind::IsPausedChanged);
    h.adapter.sync_time();

    assert!(h.adapter.is_destroyed());
    assert_eq!(h.player.listener_count(), 0);
    assert!(drain(&mut events).is_empty());
    assert_eq!(
        h.adapter
            .load_source(&clip("b.mp4"), Preload::Metadata)
            .await
            .unwrap_err(),
        ProviderError::Destroyed
    );
}
