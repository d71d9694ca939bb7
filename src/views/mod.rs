//! View rendering subsystem.
//!
//! # Data Flow
//! ```text
//! handler calls Views::render(name, locals)
//!     → lookup.rs (custom locator, then the views directory)
//!     → app locals merged with request locals
//!     → engine.rs (template engine renders the file)
//!     → Html response
//! ```
//!
//! # Design Decisions
//! - The active engine and lookup form one `ViewSet`, swapped atomically so
//!   a renderer can be replaced while requests are in flight
//! - Rendering runs on the blocking pool (template IO is synchronous)

pub mod engine;
pub mod lookup;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::response::Html;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RouteError;

pub use engine::{HandlebarsEngine, ViewEngine, ViewError};
pub use lookup::{ChainedLookup, FileLookup, ViewLocator};

/// The active engine together with its lookup strategy.
pub struct ViewSet {
    ext: String,
    views_dir: PathBuf,
    engine: Arc<dyn ViewEngine>,
    lookup: Arc<dyn ViewLocator>,
}

impl ViewSet {
    /// Engine with the default file lookup rooted at `views_dir`.
    pub fn new(ext: impl Into<String>, engine: Arc<dyn ViewEngine>, views_dir: impl Into<PathBuf>) -> Self {
        let ext = ext.into();
        let views_dir = views_dir.into();
        let lookup = Arc::new(FileLookup::new(&views_dir, ext.clone()));
        Self {
            ext,
            views_dir,
            engine,
            lookup,
        }
    }

    /// Engine whose lookup consults `locator` before the views directory.
    pub fn with_locator(
        ext: impl Into<String>,
        engine: Arc<dyn ViewEngine>,
        views_dir: impl Into<PathBuf>,
        locator: Arc<dyn ViewLocator>,
    ) -> Self {
        let ext = ext.into();
        let views_dir = views_dir.into();
        let fallback = FileLookup::new(&views_dir, ext.clone());
        Self {
            lookup: Arc::new(ChainedLookup::new(locator, fallback)),
            ext,
            views_dir,
            engine,
        }
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn views_dir(&self) -> &Path {
        &self.views_dir
    }

    pub fn engine(&self) -> Arc<dyn ViewEngine> {
        self.engine.clone()
    }

    fn render(&self, name: &str, locals: &Value) -> Result<String, ViewError> {
        let path = self.lookup.locate(name).ok_or_else(|| ViewError::Lookup {
            name: name.to_string(),
            dir: self.views_dir.clone(),
        })?;
        self.engine.render(&path, locals)
    }
}

/// Handle to the views of an app. Clones share the same state.
#[derive(Clone)]
pub struct Views {
    current: Arc<ArcSwap<ViewSet>>,
    locals: Arc<ArcSwap<Map<String, Value>>>,
}

impl Views {
    pub fn new(set: ViewSet) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(set)),
            locals: Arc::new(ArcSwap::from_pointee(Map::new())),
        }
    }

    /// Replace the active engine and lookup.
    pub fn replace(&self, set: ViewSet) {
        tracing::debug!(ext = %set.ext, views = %set.views_dir.display(), "View set replaced");
        self.current.store(Arc::new(set));
    }

    /// Current engine and lookup.
    pub fn current(&self) -> Arc<ViewSet> {
        self.current.load_full()
    }

    /// Set an app-wide template local.
    pub fn set_local(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.locals.rcu(|locals| {
            let mut locals = Map::clone(locals);
            locals.insert(key.clone(), value.clone());
            locals
        });
    }

    /// App-wide template locals.
    pub fn locals(&self) -> Map<String, Value> {
        Map::clone(&self.locals.load())
    }

    /// Render a view by name. Request locals override app locals.
    pub async fn render<L: Serialize>(&self, name: &str, locals: L) -> Result<Html<String>, RouteError> {
        let mut merged = self.locals();
        match serde_json::to_value(locals)? {
            Value::Object(map) => merged.extend(map),
            Value::Null => {}
            _ => return Err(RouteError::new(ViewError::Locals)),
        }

        let set = self.current();
        let name = name.to_string();
        let html = tokio::task::spawn_blocking(move || set.render(&name, &Value::Object(merged)))
            .await??;
        Ok(Html(html))
    }
}
