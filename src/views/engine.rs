//! Template engines.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::Value;

/// Errors raised while resolving or rendering a view.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("Failed to lookup view \"{name}\" in views directory \"{}\"", .dir.display())]
    Lookup { name: String, dir: PathBuf },

    #[error("failed to read view {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Render(#[from] handlebars::RenderError),

    #[error("view locals must be an object")]
    Locals,

    #[error("{0}")]
    Engine(String),
}

impl ViewError {
    /// Error for engines implemented as closures.
    pub fn engine(message: impl Into<String>) -> Self {
        ViewError::Engine(message.into())
    }
}

/// Renders a resolved template file with the merged locals.
pub trait ViewEngine: Send + Sync + 'static {
    fn render(&self, path: &Path, locals: &Value) -> Result<String, ViewError>;
}

impl<F> ViewEngine for F
where
    F: Fn(&Path, &Value) -> Result<String, ViewError> + Send + Sync + 'static,
{
    fn render(&self, path: &Path, locals: &Value) -> Result<String, ViewError> {
        self(path, locals)
    }
}

/// Default engine: handlebars templates read from disk on every render.
pub struct HandlebarsEngine {
    registry: Handlebars<'static>,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self {
            registry: Handlebars::new(),
        }
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewEngine for HandlebarsEngine {
    fn render(&self, path: &Path, locals: &Value) -> Result<String, ViewError> {
        let source = std::fs::read_to_string(path).map_err(|source| ViewError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.registry.render_template(&source, locals)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_handlebars_renders_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<h1>{{{{title}}}}</h1>{{{{#if pretty}}}}\n{{{{/if}}}}").unwrap();

        let html = HandlebarsEngine::new()
            .render(file.path(), &json!({"title": "Home", "pretty": false}))
            .unwrap();
        assert_eq!(html, "<h1>Home</h1>");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = HandlebarsEngine::new()
            .render(Path::new("/definitely/missing.html"), &json!({}))
            .unwrap_err();
        assert!(matches!(err, ViewError::Read { .. }));
    }

    #[test]
    fn test_closure_engine() {
        let engine = |path: &Path, locals: &Value| -> Result<String, ViewError> {
            Ok(format!("{}:{}", path.display(), locals["n"]))
        };
        assert_eq!(engine.render(Path::new("a.html"), &json!({"n": 1})).unwrap(), "a.html:1");
    }
}
