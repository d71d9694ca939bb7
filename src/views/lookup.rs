//! View lookup: mapping a view name to a template file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves a view name to a template path.
pub trait ViewLocator: Send + Sync + 'static {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

impl<F> ViewLocator for F
where
    F: Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
{
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}

/// Default lookup against a views directory.
///
/// Tries `{root}/{name}.{ext}` (no extension added when the name has one),
/// then `{root}/{name}/index.{ext}`.
#[derive(Debug, Clone)]
pub struct FileLookup {
    root: PathBuf,
    ext: String,
}

impl FileLookup {
    pub fn new(root: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ext: ext.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, name: &str) -> [PathBuf; 2] {
        let base = self.root.join(name);
        let file = if Path::new(name).extension().is_some() {
            base.clone()
        } else {
            base.with_extension(&self.ext)
        };
        [file, base.join(format!("index.{}", self.ext))]
    }
}

impl ViewLocator for FileLookup {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.candidates(name).into_iter().find(|p| p.is_file())
    }
}

/// Custom locator first, file lookup as fallback.
pub struct ChainedLookup {
    custom: Arc<dyn ViewLocator>,
    fallback: FileLookup,
}

impl ChainedLookup {
    pub fn new(custom: Arc<dyn ViewLocator>, fallback: FileLookup) -> Self {
        Self { custom, fallback }
    }
}

impl ViewLocator for ChainedLookup {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.custom
            .locate(name)
            .or_else(|| self.fallback.locate(name))
    }
}
