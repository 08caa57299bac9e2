use bridge_traits::{CastContext, CastErrorCode, CastSessionState};
use core_provider::testing::{ManualFrameScheduler, MockMediaElement};
use core_provider::tracks::MediaMetadata;
use core_provider::Source;
use core_runtime::config::{PlaybackSettings, RuntimeConfig, RuntimeConfigBuilder};
use core_runtime::events::{MediaEventType, RemotePlaybackState};
use core_service::{CoreError, MediaService};
use provider_cast::testing::MockCastContext;
use std::sync::Arc;

fn builder() -> RuntimeConfigBuilder {
    RuntimeConfig::builder().frame_scheduler(Arc::new(ManualFrameScheduler::new()))
}

fn cast_settings() -> PlaybackSettings {
    let mut settings = PlaybackSettings::default();
    settings.features.remote_playback = true;
    settings
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn test_default_loader_order_without_cast() {
    let service = MediaService::new(builder().build().unwrap()).unwrap();
    assert_eq!(service.loader_names(), vec!["hls", "video", "audio"]);
    assert!(service.cast_coordinator().is_none());
}

#[test]
fn test_cast_loader_comes_first_when_enabled() {
    let cast: Arc<dyn CastContext> = MockCastContext::new();
    let config = builder()
        .settings(cast_settings())
        .cast_context(cast)
        .build()
        .unwrap();
    let service = MediaService::new(config).unwrap();

    assert_eq!(
        service.loader_names(),
        vec!["google-cast", "hls", "video", "audio"]
    );
    assert!(service.cast_coordinator().is_some());
}

#[test]
fn test_loader_order_from_settings() {
    let settings = PlaybackSettings::from_json(r#"{ "loader_order": ["video", "hls"] }"#).unwrap();
    let service = MediaService::new(builder().settings(settings).build().unwrap()).unwrap();
    assert_eq!(service.loader_names(), vec!["video", "hls"]);
}

#[test]
fn test_remote_playback_requires_cast_context() {
    let config = RuntimeConfig {
        settings: cast_settings(),
        ..builder().build().unwrap()
    };
    let err = MediaService::new(config).unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
}

#[tokio::test]
async fn test_load_selects_local_provider() {
    let service = MediaService::new(builder().build().unwrap()).unwrap();
    let mut events = service.events();
    let element = MockMediaElement::new();
    service.mount(element.clone());

    service
        .load(Source::url("https://a/clip.mp4", "video/mp4"))
        .await
        .unwrap();

    assert_eq!(service.adapter().map(|a| a.kind()), Some("video"));
    assert_eq!(service.state().provider.as_deref(), Some("video"));
    assert_eq!(element.props().src.as_deref(), Some("https://a/clip.mp4"));

    let mut saw_provider_change = false;
    while let Ok(record) = events.try_recv() {
        if record.event_type == MediaEventType::ProviderChange {
            saw_provider_change = true;
        }
    }
    assert!(saw_provider_change);

    service.destroy().await;
    assert!(service.adapter().is_none());
}

#[tokio::test]
async fn test_unsupported_source_is_a_provider_error() {
    let service = MediaService::new(builder().build().unwrap()).unwrap();
    service.mount(MockMediaElement::new());

    let err = service
        .load(Source::url("doc.pdf", "application/pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Provider(_)));
    assert!(service.state().error.is_some());
}

#[tokio::test]
async fn test_cast_calls_need_a_coordinator() {
    let service = MediaService::new(builder().build().unwrap()).unwrap();
    let err = service.request_cast_session().await.unwrap_err();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}

#[tokio::test]
async fn test_session_request_error_surfaces() {
    let cast = MockCastContext::new();
    cast.fail_requests(Some(CastErrorCode::Cancel));
    let config = builder()
        .settings(cast_settings())
        .cast_context(cast.clone())
        .build()
        .unwrap();
    let service = MediaService::new(config).unwrap();

    let err = service.request_cast_session().await.unwrap_err();
    assert!(matches!(err, CoreError::Cast(_)));
    assert_eq!(err.to_string(), "Cast error: The operation was canceled by the user.");
}

#[tokio::test]
async fn test_connected_session_takes_over_playback() {
    let cast = MockCastContext::new();
    let config = builder()
        .settings(cast_settings())
        .cast_context(cast.clone())
        .build()
        .unwrap();
    let service = MediaService::new(config).unwrap();
    service.set_metadata(MediaMetadata {
        title: Some("Trailer".to_string()),
        poster: None,
    });
    let element = MockMediaElement::new();
    service.mount(element.clone());
    service
        .load(Source::url("https://a/clip.mp4", "video/mp4"))
        .await
        .unwrap();
    assert_eq!(service.adapter().map(|a| a.kind()), Some("video"));

    // The coordinator follows the context's session listener.
    cast.set_state(CastSessionState::SessionStarting);
    settle().await;
    let session = cast.connect("Living Room");
    cast.set_state(CastSessionState::SessionStarted);
    settle().await;

    assert_eq!(service.adapter().map(|a| a.kind()), Some("google-cast"));
    assert_eq!(
        service.state().remote_playback_state,
        RemotePlaybackState::Connected
    );
    let requests = session.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].media_info.metadata.title.as_deref(),
        Some("Trailer")
    );

    service.end_cast_session().await.unwrap();
    assert_eq!(cast.ended(), vec![false]);
    assert_eq!(service.adapter().map(|a| a.kind()), Some("video"));
    assert_eq!(
        service.state().remote_playback_state,
        RemotePlaybackState::Disconnected
    );
}
