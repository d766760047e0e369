//! Module registry
//!
//! Loads each module URL once per process and caches the resulting
//! [`ModuleFactory`]. Concurrent requests for a URL that is still loading
//! share the in-flight load.

mod source;


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tokio::sync::OnceCell;

pub use source::{DefaultSource, FetchFuture, FileSource, HttpSource, ModuleSource};

use crate::error::BridgeError;
use crate::wasm::{ModuleFactory, WasmEngine};

/// Where a family's module lives and which export constructs it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDescriptor {
    pub url: String,
    pub factory: String,
}

type LoadResult = Result<Arc<ModuleFactory>, BridgeError>;

enum Entry {
    Ready(Arc<ModuleFactory>),
    Loading(Arc<OnceCell<LoadResult>>),
}

pub struct ModuleRegistry {
    engine: Arc<WasmEngine>,
    source: Arc<dyn ModuleSource>,
    ram_limit: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ModuleRegistry {
    pub fn new(engine: Arc<WasmEngine>, source: Arc<dyn ModuleSource>, ram_limit: usize) -> Self {
        Self {
            engine,
            source,
            ram_limit,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached factory for `url`, if its load has completed
    pub fn cached(&self, url: &str) -> Option<Arc<ModuleFactory>> {
        match self.lock().get(url) {
            Some(Entry::Ready(factory)) => Some(factory.clone()),
            _ => None,
        }
    }

    /// Resolve the factory for a descriptor.
    ///
    /// Returns immediately when the URL is cached, joins the in-flight
    /// load when one is running, and otherwise starts a new load. A failed
    /// fetch or compile is forgotten so a later request tries again. The
    /// constructor export is checked per caller, after the shared load, so
    /// callers asking for different symbols never share a resolution error.
    pub async fn get_factory(&self, descriptor: &ModuleDescriptor) -> LoadResult {
        let cell = {
            let mut entries = self.lock();
            match entries.get(&descriptor.url) {
                Some(Entry::Ready(factory)) => return for_symbol(factory, descriptor),
                Some(Entry::Loading(cell)) => cell.clone(),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(descriptor.url.clone(), Entry::Loading(cell.clone()));
                    cell
                }
            }
        };

        let result = cell.get_or_init(|| self.load(descriptor)).await.clone();

        {
            let mut entries = self.lock();
            let current = matches!(
                entries.get(&descriptor.url),
                Some(Entry::Loading(c)) if Arc::ptr_eq(c, &cell)
            );
            if current {
                match &result {
                    Ok(factory) => {
                        entries.insert(descriptor.url.clone(), Entry::Ready(factory.clone()));
                    }
                    Err(_) => {
                        entries.remove(&descriptor.url);
                    }
                }
            }
        }

        result.and_then(|factory| for_symbol(&factory, descriptor))
    }

    async fn load(&self, descriptor: &ModuleDescriptor) -> LoadResult {
        let url = descriptor.url.clone();
        tracing::debug!(url, "fetching module");
        let bytes = self
            .source
            .fetch(&url)
            .await
            .map_err(|e| BridgeError::Fetch {
                url: url.clone(),
                message: format!("{e:#}"),
            })?;

        let engine = self.engine.clone();
        let ram_limit = self.ram_limit;
        let owned = descriptor.clone();
        let factory =
            tokio::task::spawn_blocking(move || ModuleFactory::compile_module(engine, &bytes, owned, ram_limit))
                .await
                .map_err(|e| BridgeError::Compile {
                    url: url.clone(),
                    message: format!("compile task failed: {e}"),
                })??;

        tracing::info!(url, "module loaded");
        Ok(Arc::new(factory))
    }
}

fn for_symbol(factory: &Arc<ModuleFactory>, descriptor: &ModuleDescriptor) -> LoadResult {
    if factory.descriptor().factory == descriptor.factory {
        factory.check_symbol()?;
        Ok(factory.clone())
    } else {
        factory.with_symbol(&descriptor.factory).map(Arc::new)
    }
}
