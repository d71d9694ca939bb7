//! Error types shared by the facades and the request pipeline.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised by the facade lifecycle methods.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error("{0} used before init")]
    NotInitialized(&'static str),

    #[error("{0} already initialized")]
    AlreadyInitialized(&'static str),

    #[error("server already started")]
    AlreadyStarted,

    #[error("invalid PORT value {0:?}")]
    InvalidPort(String),

    #[error(transparent)]
    InvalidPattern(#[from] crate::http::routes::InvalidPattern),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// An error produced while handling a request.
///
/// Wraps any `std::error::Error` so the original value reaches `'500'`
/// listeners unchanged. Cheap to clone; it travels in response extensions
/// from the handler to the error classifier.
#[derive(Clone)]
pub struct RouteError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl RouteError {
    /// Wrap an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self { inner: Arc::new(error) }
    }

    /// Build an error from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(MessageError(message.to_string()))
    }

    /// Build an error classified as a routing miss, e.g. `"user 7 not found"`.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::msg(format_args!("{what} not found"))
    }

    /// The error message as the classifier sees it.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// Whether the message marks this error as a routing miss.
    pub fn is_routing_miss(&self) -> bool {
        self.message().contains("not found")
    }

    /// Borrow the wrapped error.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// Attempt to downcast the wrapped error.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// The message followed by every `source()` in the chain.
    pub fn chain(&self) -> Vec<String> {
        let mut out = vec![self.message()];
        let mut source = self.inner.source();
        while let Some(err) = source {
            out.push(err.to_string());
            source = err.source();
        }
        out
    }
}

impl<E> From<E> for RouteError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Stashes the error in the response; the error classifier decides the
/// final response.
impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}
