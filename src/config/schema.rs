//! Configuration schema definitions.
//!
//! The configuration is a flat record read once at startup. All types derive
//! Serde traits for deserialization from config files; the camelCase keys used
//! by older host configurations are accepted as aliases.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the web host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Include error details in default 500 responses.
    #[serde(alias = "showStackError")]
    pub show_stack_error: bool,

    /// Exposed to templates as the `pretty` local.
    #[serde(alias = "prettyHTML", alias = "prettyHtml")]
    pub pretty_html: bool,

    /// Compress text-like responses.
    pub compression: bool,

    /// Mount path → directory, in mount order.
    #[serde(rename = "static")]
    pub static_dirs: IndexMap<String, String>,

    /// Wrap JSON responses for `?callback=` requests.
    pub jsonp: bool,

    /// Extension the view engine is registered under (e.g. "html").
    #[serde(alias = "viewEngine")]
    pub view_engine: String,

    /// Template set name, used to compose the views directory.
    pub template: String,

    /// Application root; relative static directories resolve against it.
    pub root: String,

    /// Listening port, overridden by the `PORT` environment variable.
    pub port: u16,

    /// Bind host.
    pub host: String,

    /// Maximum body size accepted by the body parsers, in bytes.
    #[serde(alias = "bodyLimit")]
    pub body_limit: usize,

    /// Request timeout in seconds.
    #[serde(alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            show_stack_error: false,
            pretty_html: false,
            compression: true,
            static_dirs: IndexMap::new(),
            jsonp: false,
            view_engine: "html".to_string(),
            template: "default".to_string(),
            root: ".".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            body_limit: 100 * 1024,
            request_timeout_secs: 30,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl WebConfig {
    /// Directory holding the view templates: `{root}/template/{template}/`.
    pub fn views_dir(&self) -> PathBuf {
        PathBuf::from(&self.root).join("template").join(&self.template)
    }

    /// Resolve a configured path against the application root.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            PathBuf::from(&self.root).join(path)
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
