//! Application events raised by the request pipeline.
//!
//! Two kinds of subscribers exist:
//! - responding listeners for `'404'` and `'500'`, which may produce the
//!   response for the request that raised the event;
//! - passive observers on a broadcast channel, which only see notifications.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;

use crate::error::RouteError;
use crate::observability::metrics;

/// Events a request can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppEvent {
    /// No middleware or route responded.
    NotFound,
    /// A handler or middleware failed.
    ServerError,
}

impl AppEvent {
    /// Event name as the host knows it.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEvent::NotFound => "404",
            AppEvent::ServerError => "500",
        }
    }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request context carried by an event.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event: AppEvent,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub request_id: Option<String>,
    /// Set for `'500'` only; the original error, unchanged.
    pub error: Option<RouteError>,
}

impl EventContext {
    pub fn new(event: AppEvent, method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let request_id = headers
            .get(crate::http::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Self {
            event,
            method,
            uri,
            headers,
            request_id,
            error: None,
        }
    }

    pub fn with_error(mut self, error: RouteError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Passive notification published for every raised event and route
/// registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    NotFound { method: String, path: String },
    ServerError { method: String, path: String, message: String },
    RouteRegistered { method: String, pattern: String },
}

type Listener = Arc<dyn Fn(EventContext) -> BoxFuture<'static, Option<Response>> + Send + Sync>;

struct HubInner {
    listeners: RwLock<Vec<(AppEvent, Listener)>>,
    notify: broadcast::Sender<Notification>,
}

/// Event hub shared by the host, the facades and the request pipeline.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(HubInner {
                listeners: RwLock::new(Vec::new()),
                notify,
            }),
        }
    }

    /// Register a responding listener.
    ///
    /// Listeners run in registration order; the first one returning a
    /// response ends the chain. Returning `None` passes to the next one.
    pub fn on<F, Fut>(&self, event: AppEvent, listener: F) -> &Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Response>> + Send + 'static,
    {
        let listener: Listener =
            Arc::new(move |ctx| -> BoxFuture<'static, Option<Response>> { Box::pin(listener(ctx)) });
        self.inner
            .listeners
            .write()
            .expect("event hub lock poisoned")
            .push((event, listener));
        self
    }

    /// Number of responding listeners registered for an event.
    pub fn listener_count(&self, event: AppEvent) -> usize {
        self.inner
            .listeners
            .read()
            .expect("event hub lock poisoned")
            .iter()
            .filter(|(e, _)| *e == event)
            .count()
    }

    /// Subscribe to passive notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notify.subscribe()
    }

    /// Publish a notification; dropped when nobody listens.
    pub fn publish(&self, notification: Notification) {
        let _ = self.inner.notify.send(notification);
    }

    /// Raise an event and return the first listener response, if any.
    pub async fn trigger(&self, ctx: EventContext) -> Option<Response> {
        metrics::record_event(ctx.event.as_str());
        self.publish(notification_for(&ctx));

        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .expect("event hub lock poisoned")
            .iter()
            .filter(|(e, _)| *e == ctx.event)
            .map(|(_, l)| l.clone())
            .collect();

        tracing::debug!(
            event = %ctx.event,
            method = %ctx.method,
            path = %ctx.uri.path(),
            listeners = listeners.len(),
            "Triggering event"
        );

        for listener in listeners {
            if let Some(response) = listener(ctx.clone()).await {
                return Some(response);
            }
        }
        None
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

fn notification_for(ctx: &EventContext) -> Notification {
    let method = ctx.method.to_string();
    let path = ctx.uri.path().to_string();
    match ctx.event {
        AppEvent::NotFound => Notification::NotFound { method, path },
        AppEvent::ServerError => Notification::ServerError {
            method,
            path,
            message: ctx.error.as_ref().map(RouteError::message).unwrap_or_default(),
        },
    }
}
