use bridge_traits::{GlobalValue, ListenerId, MediaElement, NativeEventKind, Preload};
use core_provider::library::LibraryRef;
use core_provider::probe::CapabilityProbes;
use core_provider::testing::{CountingScriptHost, ManualFrameScheduler, MockMediaElement};
use core_provider::{
    LoaderRegistry, NativeAdapter, ProviderAdapter, ProviderContext, ProviderError,
    ProviderLoader, ProviderRuntime, Source, VideoLoader,
};
use core_runtime::config::{PlaybackSettings, RuntimeConfig};
use core_runtime::events::{
    EventRecord, MediaErrorCode, MediaEventKind, MediaEventType, Receiver, StreamType,
};
use parking_lot::Mutex;
use provider_hls::{
    HlsEngine, HlsEngineFactory, HlsEngineStrategy, HlsError, HlsErrorKind, HlsEvent,
    HlsListener, HlsLoader,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const ENGINE_URL: &str = "https://cdn.test/hls.min.js";

// ============================================================================
// Engine doubles
// ============================================================================

#[derive(Default)]
struct MockEngine {
    attached: Mutex<bool>,
    sources: Mutex<Vec<String>>,
    start_loads: AtomicUsize,
    stop_loads: AtomicUsize,
    destroyed: AtomicUsize,
    listeners: Mutex<Vec<(ListenerId, HlsListener)>>,
}

impl MockEngine {
    fn emit(&self, event: HlsEvent) {
        let listeners: Vec<HlsListener> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl HlsEngine for MockEngine {
    fn attach_media(&self, _element: Arc<dyn MediaElement>) {
        *self.attached.lock() = true;
    }

    fn detach_media(&self) {
        *self.attached.lock() = false;
    }

    fn load_source(&self, url: &str) {
        self.sources.lock().push(url.to_string());
    }

    fn start_load(&self, _start_position: f64) {
        self.start_loads.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_load(&self) {
        self.stop_loads.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn add_listener(&self, listener: HlsListener) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = ListenerId(listeners.len() as u64 + 1);
        listeners.push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }
}

struct MockFactory {
    supported: bool,
    created: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockFactory {
    fn new(supported: bool) -> Arc<Self> {
        Arc::new(Self {
            supported,
            created: Mutex::new(Vec::new()),
        })
    }

    fn engine(&self) -> Arc<MockEngine> {
        self.created.lock().last().cloned().unwrap()
    }

    fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl HlsEngineFactory for MockFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self) -> Result<Arc<dyn HlsEngine>, HlsError> {
        let engine = Arc::new(MockEngine::default());
        self.created.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}

// ============================================================================
// Harness
// ============================================================================

fn context_with(host: Option<Arc<CountingScriptHost>>, media_source: bool) -> ProviderContext {
    let mut settings = PlaybackSettings::default();
    settings.hls.url = ENGINE_URL.to_string();
    let mut builder = RuntimeConfig::builder()
        .settings(settings)
        .frame_scheduler(Arc::new(ManualFrameScheduler::new()));
    if let Some(host) = host {
        builder = builder.script_host(host);
    }
    let config = builder.build().unwrap();
    let probes = CapabilityProbes::new().with_media_source(move || media_source);
    ProviderContext::with_probes(&config, probes)
}

fn drain(rx: &mut Receiver<EventRecord>) -> Vec<EventRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

fn count(records: &[EventRecord], event_type: MediaEventType) -> usize {
    records.iter().filter(|r| r.event_type == event_type).count()
}

fn error_codes(records: &[EventRecord]) -> Vec<Option<MediaErrorCode>> {
    records
        .iter()
        .filter_map(|r| match &r.kind {
            MediaEventKind::Error(detail) => Some(detail.code),
            _ => None,
        })
        .collect()
}

fn hls_adapter(
    ctx: &ProviderContext,
    factory: &Arc<MockFactory>,
) -> (Arc<NativeAdapter>, Arc<MockMediaElement>) {
    let element = MockMediaElement::new();
    let dyn_factory: Arc<dyn HlsEngineFactory> = factory.clone();
    let strategy = HlsEngineStrategy::new(LibraryRef::value(dyn_factory));
    let adapter = NativeAdapter::new(ctx.clone(), element.clone(), Arc::new(strategy));
    (adapter, element)
}

fn served_host(factory: &Arc<MockFactory>) -> Arc<CountingScriptHost> {
    let host = CountingScriptHost::new();
    let dyn_factory: Arc<dyn HlsEngineFactory> = factory.clone();
    let value: GlobalValue = Arc::new(dyn_factory);
    host.serve(ENGINE_URL, "Hls", value);
    host
}

// ============================================================================
// Library loading
// ============================================================================

#[tokio::test]
async fn test_broken_engine_url_reports_once() {
    let host = CountingScriptHost::new();
    host.fail(ENGINE_URL);
    let ctx = context_with(Some(host.clone()), true);
    let mut events = ctx.delegate.bus().subscribe();
    let loader = HlsLoader::new(ctx.clone());
    let element = MockMediaElement::new();
    loader.target().set(Some(element));

    let adapter = loader.load(&ctx).await.unwrap();
    let err = adapter.setup().await.unwrap_err();
    assert!(matches!(err, ProviderError::LibraryLoad { .. }));

    let records = drain(&mut events);
    assert_eq!(count(&records, MediaEventType::LibLoadStart), 1);
    assert_eq!(count(&records, MediaEventType::LibLoadError), 1);
    assert_eq!(count(&records, MediaEventType::LibLoaded), 0);
    assert_eq!(count(&records, MediaEventType::ProviderSetup), 0);
    assert_eq!(error_codes(&records), vec![Some(MediaErrorCode::InvalidResource)]);
    assert_eq!(host.fetch_count(ENGINE_URL), 1);
}

#[tokio::test]
async fn test_engine_script_fetched_once_for_concurrent_setups() {
    let factory = MockFactory::new(true);
    let host = served_host(&factory);
    let ctx = context_with(Some(host.clone()), true);
    let mut events = ctx.delegate.bus().subscribe();

    let first = HlsLoader::new(ctx.clone());
    first.target().set(Some(MockMediaElement::new()));
    let second = HlsLoader::new(ctx.clone());
    second.target().set(Some(MockMediaElement::new()));
    let a = first.load(&ctx).await.unwrap();
    let b = second.load(&ctx).await.unwrap();

    let (ra, rb) = tokio::join!(a.setup(), b.setup());
    ra.unwrap();
    rb.unwrap();

    assert_eq!(host.fetch_count(ENGINE_URL), 1);
    assert_eq!(factory.created_count(), 2);
    let records = drain(&mut events);
    assert_eq!(count(&records, MediaEventType::LibLoaded), 2);
    assert_eq!(count(&records, MediaEventType::ProviderSetup), 2);
}

#[tokio::test]
async fn test_unsupported_engine_is_never_created() {
    let factory = MockFactory::new(false);
    let ctx = context_with(None, true);
    let mut events = ctx.delegate.bus().subscribe();
    let (adapter, _element) = hls_adapter(&ctx, &factory);

    let err = adapter.setup().await.unwrap_err();

    assert!(matches!(err, ProviderError::Unsupported { .. }));
    assert_eq!(factory.created_count(), 0);
    let records = drain(&mut events);
    assert_eq!(count(&records, MediaEventType::LibLoaded), 1);
    assert_eq!(count(&records, MediaEventType::Unsupported), 1);
    assert_eq!(error_codes(&records), vec![Some(MediaErrorCode::InvalidResource)]);
}

// ============================================================================
// Engine events
// ============================================================================

#[tokio::test]
async fn test_fatal_engine_errors_map_to_media_codes() {
    let factory = MockFactory::new(true);
    let ctx = context_with(None, true);
    let mut events = ctx.delegate.bus().subscribe();
    let (adapter, _element) = hls_adapter(&ctx, &factory);
    adapter.setup().await.unwrap();
    let engine = factory.engine();
    drain(&mut events);

    engine.emit(HlsEvent::Error {
        fatal: false,
        kind: HlsErrorKind::Network,
        details: "fragLoadTimeOut".into(),
    });
    assert!(drain(&mut events).is_empty());

    for (kind, expected) in [
        (HlsErrorKind::Network, MediaErrorCode::Network),
        (HlsErrorKind::Media, MediaErrorCode::Decode),
        (HlsErrorKind::Other, MediaErrorCode::InvalidResource),
    ] {
        engine.emit(HlsEvent::Error {
            fatal: true,
            kind,
            details: "boom".into(),
        });
        let records = drain(&mut events);
        assert_eq!(error_codes(&records), vec![Some(expected)]);
        assert_eq!(records[0].trigger_chain, vec!["hlsError".to_string()]);
        assert_eq!(records[0].provider.as_deref(), Some("hls"));
    }
}

#[tokio::test]
async fn test_level_details_decide_stream_type() {
    let factory = MockFactory::new(true);
    let ctx = context_with(None, true);
    let mut events = ctx.delegate.bus().subscribe();
    let (adapter, element) = hls_adapter(&ctx, &factory);
    adapter.setup().await.unwrap();
    adapter
        .load_source(&Source::url("https://a/live.m3u8", ""), Preload::Metadata)
        .await
        .unwrap();
    let engine = factory.engine();
    drain(&mut events);

    // Engine backends never derive the stream type from the element.
    element.update(|p| p.duration = f64::INFINITY);
    element.dispatch(NativeEventKind::LoadStart);
    element.dispatch(NativeEventKind::LoadedMetadata);
    assert_eq!(count(&drain(&mut events), MediaEventType::StreamTypeChange), 0);

    let live = HlsEvent::LevelLoaded {
        live: true,
        total_duration: 30.0,
    };
    engine.emit(live.clone());
    engine.emit(live);
    let records = drain(&mut events);
    assert_eq!(count(&records, MediaEventType::StreamTypeChange), 1);
    assert_eq!(ctx.delegate.snapshot().stream_type, StreamType::Live);

    engine.emit(HlsEvent::LevelLoaded {
        live: false,
        total_duration: 600.0,
    });
    assert_eq!(ctx.delegate.snapshot().stream_type, StreamType::OnDemand);
}

// ============================================================================
// Sources and teardown
// ============================================================================

#[tokio::test]
async fn test_load_source_feeds_engine() {
    let factory = MockFactory::new(true);
    let ctx = context_with(None, true);
    let (adapter, element) = hls_adapter(&ctx, &factory);
    adapter.setup().await.unwrap();
    let engine = factory.engine();
    assert!(*engine.attached.lock());

    adapter
        .load_source(&Source::url("https://a/one.m3u8", ""), Preload::Auto)
        .await
        .unwrap();
    adapter
        .load_source(&Source::url("https://a/two.m3u8", ""), Preload::None)
        .await
        .unwrap();

    assert_eq!(
        *engine.sources.lock(),
        vec!["https://a/one.m3u8".to_string(), "https://a/two.m3u8".to_string()]
    );
    assert_eq!(engine.start_loads.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stop_loads.load(Ordering::SeqCst), 1);
    // The engine owns the element's resource.
    assert!(element.props().src.is_none());
}

#[tokio::test]
async fn test_destroy_releases_engine() {
    let factory = MockFactory::new(true);
    let ctx = context_with(None, true);
    let mut events = ctx.delegate.bus().subscribe();
    let (adapter, element) = hls_adapter(&ctx, &factory);
    adapter.setup().await.unwrap();
    let engine = factory.engine();

    adapter.destroy().await;

    assert!(!*engine.attached.lock());
    assert_eq!(engine.destroyed.load(Ordering::SeqCst), 1);
    assert!(engine.listeners.lock().is_empty());
    assert_eq!(element.total_listeners(), 0);

    drain(&mut events);
    engine.emit(HlsEvent::Error {
        fatal: true,
        kind: HlsErrorKind::Media,
        details: "late".into(),
    });
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_native_hls_wins_without_media_source() {
    let ctx = context_with(None, false);
    let registry = LoaderRegistry::new()
        .with(Arc::new(HlsLoader::new(ctx.clone())))
        .with(Arc::new(VideoLoader::new(ctx.clone())));
    let runtime = ProviderRuntime::new(ctx, registry);
    let element = MockMediaElement::new();
    element.update(|p| p.native_hls = true);
    runtime.mount(element.clone());

    runtime
        .load(Source::url("https://a/live.m3u8", "application/x-mpegurl"))
        .await
        .unwrap();

    assert_eq!(runtime.loader().map(|l| l.name()), Some("video"));
    assert_eq!(element.props().src.as_deref(), Some("https://a/live.m3u8"));
}
