//! # Backend Library Loader
//!
//! Resolves a backend's runtime library from one of several module strategies
//! behind a single contract:
//!
//! - **Url**: a network script fetched through the [`ScriptHost`]. Fetches are
//!   single-flight per URL and successful resolutions are cached; afterwards
//!   the expected global symbol must be present.
//! - **Export**: a statically linked constructor or a module namespace whose
//!   `default` export holds it.
//! - **Factory**: an async factory producing an export (dynamic import).
//!
//! A URL-loaded global is expected to hold an `Arc<C>` inside the host's
//! [`GlobalValue`], i.e. hosts register `Arc::new(Arc<dyn MyEngine>)`.
//!
//! Each attempt reports load-start once and then exactly one of loaded or
//! load-error through a [`LibraryLoadObserver`].

use crate::error::{ProviderError, Result};
use bridge_traits::{GlobalValue, ScriptHost};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// An export as a module system would present it.
pub enum LibraryExport<C: ?Sized> {
    Value(Arc<C>),
    /// A namespace object; only its `default` export is inspected.
    Namespace { default: Option<Arc<C>> },
}

impl<C: ?Sized> LibraryExport<C> {
    fn resolve(self) -> Option<Arc<C>> {
        match self {
            LibraryExport::Value(value) => Some(value),
            LibraryExport::Namespace { default } => default,
        }
    }
}

impl<C: ?Sized> Clone for LibraryExport<C> {
    fn clone(&self) -> Self {
        match self {
            LibraryExport::Value(value) => LibraryExport::Value(Arc::clone(value)),
            LibraryExport::Namespace { default } => LibraryExport::Namespace {
                default: default.clone(),
            },
        }
    }
}

pub type LibraryFactory<C> =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<LibraryExport<C>, String>> + Send + Sync>;

/// Where a backend library comes from.
pub enum LibraryRef<C: ?Sized> {
    Url { url: String, global: String },
    Export(LibraryExport<C>),
    Factory(LibraryFactory<C>),
}

impl<C: ?Sized> LibraryRef<C> {
    pub fn url(url: impl Into<String>, global: impl Into<String>) -> Self {
        LibraryRef::Url {
            url: url.into(),
            global: global.into(),
        }
    }

    pub fn value(value: Arc<C>) -> Self {
        LibraryRef::Export(LibraryExport::Value(value))
    }

    /// Short description for events and logs.
    pub fn describe(&self) -> String {
        match self {
            LibraryRef::Url { url, .. } => core_runtime::logging::redact_src(url).to_string(),
            LibraryRef::Export(_) => "<static>".to_string(),
            LibraryRef::Factory(_) => "<factory>".to_string(),
        }
    }
}

impl<C: ?Sized> Clone for LibraryRef<C> {
    fn clone(&self) -> Self {
        match self {
            LibraryRef::Url { url, global } => LibraryRef::Url {
                url: url.clone(),
                global: global.clone(),
            },
            LibraryRef::Export(export) => LibraryRef::Export(export.clone()),
            LibraryRef::Factory(factory) => LibraryRef::Factory(Arc::clone(factory)),
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for LibraryRef<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LibraryRef({})", self.describe())
    }
}

/// Lifecycle callbacks of one load attempt.
pub trait LibraryLoadObserver<C: ?Sized>: Send + Sync {
    fn on_load_start(&self) {}
    fn on_loaded(&self, _library: &Arc<C>) {}
    fn on_load_error(&self, _error: &ProviderError) {}
}

/// Observer that ignores every notification.
pub struct SilentObserver;

impl<C: ?Sized> LibraryLoadObserver<C> for SilentObserver {}

type ScriptFuture = Shared<BoxFuture<'static, std::result::Result<GlobalValue, ProviderError>>>;

/// Single-flight cache of URL-loaded globals.
pub struct LibraryLoader {
    host: Option<Arc<dyn ScriptHost>>,
    scripts: Mutex<HashMap<String, ScriptFuture>>,
}

impl LibraryLoader {
    pub fn new(host: Option<Arc<dyn ScriptHost>>) -> Self {
        Self {
            host,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> Option<&Arc<dyn ScriptHost>> {
        self.host.as_ref()
    }

    pub fn preconnect<C: ?Sized>(&self, library: &LibraryRef<C>) {
        if let (Some(host), LibraryRef::Url { url, .. }) = (&self.host, library) {
            host.preconnect(url);
        }
    }

    pub async fn load<C>(
        &self,
        library: &LibraryRef<C>,
        observer: &dyn LibraryLoadObserver<C>,
    ) -> Result<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        observer.on_load_start();
        tracing::debug!(library = %library.describe(), "loading backend library");

        match self.resolve(library).await {
            Ok(resolved) => {
                tracing::debug!(library = %library.describe(), "backend library loaded");
                observer.on_loaded(&resolved);
                Ok(resolved)
            }
            Err(err) => {
                tracing::warn!(library = %library.describe(), error = %err, "backend library failed");
                observer.on_load_error(&err);
                Err(err)
            }
        }
    }

    async fn resolve<C>(&self, library: &LibraryRef<C>) -> Result<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        match library {
            LibraryRef::Url { url, global } => {
                let value = self.fetch_global(url, global).await?;
                value
                    .downcast::<Arc<C>>()
                    .map(|inner| Arc::clone(&*inner))
                    .map_err(|_| ProviderError::LibraryMissing {
                        library: global.clone(),
                    })
            }
            LibraryRef::Export(export) => {
                export
                    .clone()
                    .resolve()
                    .ok_or_else(|| ProviderError::LibraryMissing {
                        library: library.describe(),
                    })
            }
            LibraryRef::Factory(factory) => {
                let export = factory().await.map_err(|message| ProviderError::LibraryLoad {
                    library: library.describe(),
                    message,
                })?;
                export.resolve().ok_or_else(|| ProviderError::LibraryMissing {
                    library: library.describe(),
                })
            }
        }
    }

    async fn fetch_global(&self, url: &str, global: &str) -> Result<GlobalValue> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| ProviderError::LibraryLoad {
                library: url.to_string(),
                message: "no script host available".to_string(),
            })?;

        let future = {
            let mut scripts = self.scripts.lock();
            scripts
                .entry(url.to_string())
                .or_insert_with(|| {
                    let url = url.to_string();
                    let global = global.to_string();
                    async move {
                        host.load_script(&url)
                            .await
                            .map_err(|err| ProviderError::LibraryLoad {
                                library: url.clone(),
                                message: err.to_string(),
                            })?;
                        host.global(&global)
                            .ok_or(ProviderError::LibraryMissing { library: global })
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let result = future.clone().await;
        if result.is_err() {
            let mut scripts = self.scripts.lock();
            if scripts
                .get(url)
                .map(|cached| cached.ptr_eq(&future))
                .unwrap_or(false)
            {
                scripts.remove(url);
            }
        }
        result
    }
}

impl std::fmt::Debug for LibraryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryLoader")
            .field("cached", &self.scripts.lock().len())
            .finish()
    }
}
