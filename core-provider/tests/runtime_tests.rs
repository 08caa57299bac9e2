use async_trait::async_trait;
use bridge_traits::NativeEventKind;
use core_provider::loader::TargetSlot;
use core_provider::testing::{ManualFrameScheduler, MockMediaElement};
use core_provider::{
    ElementStrategy, LoaderRegistry, MediaType, NativeAdapter, PlaybackHandoff, ProviderAdapter,
    ProviderContext, ProviderError, ProviderLoader, ProviderRuntime, ResumePoint, Result, Source,
    VideoLoader,
};
use core_runtime::config::RuntimeConfig;
use core_runtime::events::{EventRecord, MediaErrorCode, MediaEventKind, MediaEventType, Receiver};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

fn context() -> ProviderContext {
    let config = RuntimeConfig::builder()
        .frame_scheduler(Arc::new(ManualFrameScheduler::new()))
        .build()
        .unwrap();
    ProviderContext::from_config(&config)
}

fn drain(rx: &mut Receiver<EventRecord>) -> Vec<EventRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

fn same_adapter(a: &Arc<dyn ProviderAdapter>, b: &Arc<dyn ProviderAdapter>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Loader with a fixed predicate that never gets far enough to load.
struct DecliningLoader {
    name: &'static str,
    target: TargetSlot,
}

#[async_trait]
impl ProviderLoader for DecliningLoader {
    fn name(&self) -> &'static str {
        self.name
    }

    fn target(&self) -> &TargetSlot {
        &self.target
    }

    fn can_play(&self, _source: &Source) -> bool {
        false
    }

    fn media_type(&self, _source: Option<&Source>) -> MediaType {
        MediaType::Video
    }

    async fn load(&self, _ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
        panic!("declining loader must never load");
    }
}

/// Loader whose `load` parks until released, to lose a race on purpose.
struct GatedLoader {
    target: TargetSlot,
    gate: Arc<Notify>,
    built: Mutex<Option<Arc<NativeAdapter>>>,
}

#[async_trait]
impl ProviderLoader for GatedLoader {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn target(&self) -> &TargetSlot {
        &self.target
    }

    fn can_play(&self, source: &Source) -> bool {
        source.src().map(|s| s.ends_with(".gated")).unwrap_or(false)
    }

    fn media_type(&self, _source: Option<&Source>) -> MediaType {
        MediaType::Video
    }

    async fn load(&self, ctx: &ProviderContext) -> Result<Arc<dyn ProviderAdapter>> {
        self.gate.notified().await;
        let element = self.target.get().ok_or(ProviderError::NoTarget("gated"))?;
        let adapter = NativeAdapter::new(ctx.clone(), element, Arc::new(ElementStrategy::new("gated")));
        *self.built.lock() = Some(Arc::clone(&adapter));
        Ok(adapter)
    }
}

fn runtime_with(loaders: Vec<Arc<dyn ProviderLoader>>, ctx: ProviderContext) -> ProviderRuntime {
    let mut registry = LoaderRegistry::new();
    for loader in loaders {
        registry.register(loader);
    }
    ProviderRuntime::new(ctx, registry)
}

#[tokio::test]
async fn test_first_accepting_loader_is_selected() {
    let ctx = context();
    let mut events = ctx.delegate.bus().subscribe();
    let runtime = runtime_with(
        vec![
            Arc::new(DecliningLoader {
                name: "hls",
                target: TargetSlot::new(),
            }),
            Arc::new(VideoLoader::new(ctx.clone())),
        ],
        ctx.clone(),
    );
    let element = MockMediaElement::new();
    runtime.mount(element.clone());

    runtime
        .load(Source::url("a.mp4", "video/mp4"))
        .await
        .unwrap();

    let adapter = runtime.adapter().unwrap();
    assert_eq!(adapter.kind(), "video");
    assert_eq!(runtime.loader().map(|l| l.name()), Some("video"));
    assert_eq!(element.props().src.as_deref(), Some("a.mp4"));

    let types: Vec<MediaEventType> = drain(&mut events).iter().map(|r| r.event_type).collect();
    assert_eq!(
        types,
        vec![
            MediaEventType::SourceChange,
            MediaEventType::ProviderSetup,
            MediaEventType::ProviderChange,
        ]
    );
    assert_eq!(ctx.delegate.snapshot().provider.as_deref(), Some("video"));
}

#[tokio::test]
async fn test_no_supported_provider_is_reported() {
    let ctx = context();
    let mut events = ctx.delegate.bus().subscribe();
    let runtime = runtime_with(vec![Arc::new(VideoLoader::new(ctx.clone()))], ctx.clone());
    runtime.mount(MockMediaElement::new());

    let err = runtime
        .load(Source::url("doc.pdf", "application/pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NoSupportedProvider(_)));

    let error = drain(&mut events)
        .into_iter()
        .find_map(|r| match r.kind {
            MediaEventKind::Error(detail) => Some(detail),
            _ => None,
        })
        .unwrap();
    assert_eq!(error.code, Some(MediaErrorCode::InvalidResource));
    assert!(runtime.adapter().is_none());
}

#[tokio::test]
async fn test_missing_surface_fails_at_load() {
    let ctx = context();
    let runtime = runtime_with(vec![Arc::new(VideoLoader::new(ctx.clone()))], ctx);

    let err = runtime
        .load(Source::url("a.mp4", "video/mp4"))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::NoTarget("video"));
}

#[tokio::test]
async fn test_same_loader_keeps_adapter() {
    let ctx = context();
    let runtime = runtime_with(vec![Arc::new(VideoLoader::new(ctx.clone()))], ctx);
    let element = MockMediaElement::new();
    runtime.mount(element.clone());

    runtime.load(Source::url("a.mp4", "video/mp4")).await.unwrap();
    let first = runtime.adapter().unwrap();
    runtime.load(Source::url("b.mp4", "video/mp4")).await.unwrap();
    let second = runtime.adapter().unwrap();

    assert!(same_adapter(&first, &second));
    assert_eq!(element.props().src.as_deref(), Some("b.mp4"));
    assert_eq!(element.load_calls(), 2);
}

#[tokio::test]
async fn test_superseded_load_is_dropped_silently() {
    let ctx = context();
    let mut events = ctx.delegate.bus().subscribe();
    let gate = Arc::new(Notify::new());
    let gated = Arc::new(GatedLoader {
        target: TargetSlot::new(),
        gate: Arc::clone(&gate),
        built: Mutex::new(None),
    });
    let runtime = runtime_with(
        vec![gated.clone(), Arc::new(VideoLoader::new(ctx.clone()))],
        ctx,
    );
    runtime.mount(MockMediaElement::new());

    let (slow, fast) = tokio::join!(runtime.load(Source::untyped("https://a/clip.gated")), async {
        let result = runtime.load(Source::url("b.mp4", "video/mp4")).await;
        gate.notify_one();
        result
    });

    assert_eq!(slow.unwrap_err(), ProviderError::RaceLost);
    fast.unwrap();
    assert_eq!(runtime.adapter().map(|a| a.kind()), Some("video"));

    let stale = gated.built.lock().clone().unwrap();
    assert!(stale.is_destroyed());

    let records = drain(&mut events);
    assert!(records.iter().all(|r| r.event_type != MediaEventType::Error));
    assert!(records
        .iter()
        .all(|r| r.provider.as_deref() != Some("gated")));
}

#[tokio::test]
async fn test_resume_point_applied_on_reselect() {
    let ctx = context();
    let runtime = runtime_with(vec![Arc::new(VideoLoader::new(ctx.clone()))], ctx);
    let element = MockMediaElement::new();
    runtime.mount(element.clone());
    runtime.load(Source::url("a.mp4", "video/mp4")).await.unwrap();

    runtime.set_resume_point(ResumePoint {
        time: 42.0,
        paused: false,
    });
    runtime.reselect().await.unwrap();

    assert_eq!(element.props().current_time, 42.0);
    assert_eq!(element.play_calls(), 1);
    // Same source on the same adapter: no second fetch.
    assert_eq!(element.load_calls(), 1);
}

#[tokio::test]
async fn test_resume_point_dropped_on_new_source() {
    let ctx = context();
    let runtime = runtime_with(vec![Arc::new(VideoLoader::new(ctx.clone()))], ctx);
    let element = MockMediaElement::new();
    runtime.mount(element.clone());
    runtime.load(Source::url("a.mp4", "video/mp4")).await.unwrap();

    runtime.set_resume_point(ResumePoint {
        time: 42.0,
        paused: false,
    });
    runtime.load(Source::url("b.mp4", "video/mp4")).await.unwrap();

    assert_eq!(element.props().current_time, 0.0);
    assert_eq!(element.play_calls(), 0);
}

#[tokio::test]
async fn test_destroy_tears_down_adapter() {
    let ctx = context();
    let mut events = ctx.delegate.bus().subscribe();
    let runtime = runtime_with(vec![Arc::new(VideoLoader::new(ctx.clone()))], ctx);
    let element = MockMediaElement::new();
    runtime.mount(element.clone());
    runtime.load(Source::url("a.mp4", "video/mp4")).await.unwrap();
    drain(&mut events);

    runtime.destroy().await;

    assert!(runtime.adapter().is_none());
    assert!(runtime.current_source().is_none());
    assert_eq!(element.total_listeners(), 0);
    let records = drain(&mut events);
    assert_eq!(
        records.last().map(|r| r.kind.clone()),
        Some(MediaEventKind::ProviderChange { provider: None })
    );

    element.dispatch(NativeEventKind::LoadStart);
    assert!(drain(&mut events).is_empty());
    assert_eq!(runtime.play().await.unwrap_err(), ProviderError::NoActiveProvider);
}
