//! Terminal handlers: the error classifier and the catch-all 404.
//!
//! Handler and middleware failures travel outward as [`RouteError`] values in
//! the response extensions. The classifier turns them into events:
//! - message contains `"not found"`: routing miss, raise `'404'`
//! - anything else: raise `'500'` with the original error
//!
//! A request nobody answered reaches the router fallback, which raises
//! `'404'`. When no listener responds, a default response is sent.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::RouteError;
use crate::host::events::{AppEvent, EventContext, EventHub};

/// State of the error classifier.
#[derive(Clone)]
pub struct ErrorHandlerState {
    pub events: EventHub,
    pub show_stack_error: bool,
    /// Whether a catch-all 404 is installed after the classifier.
    pub raise_not_found: bool,
}

pub async fn handle_errors(
    State(state): State<ErrorHandlerState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();

    let mut response = next.run(request).await;
    let Some(error) = response.extensions_mut().remove::<RouteError>() else {
        return response;
    };

    if error.is_routing_miss() {
        tracing::debug!(method = %method, path = %uri.path(), error = %error, "Treating error as routing miss");
        if !state.raise_not_found {
            return default_not_found(&method, &uri);
        }
        let ctx = EventContext::new(AppEvent::NotFound, method.clone(), uri.clone(), headers);
        return match state.events.trigger(ctx).await {
            Some(response) => response,
            None => default_not_found(&method, &uri),
        };
    }

    tracing::error!(method = %method, path = %uri.path(), error = %error, "Request failed");
    let ctx = EventContext::new(AppEvent::ServerError, method, uri, headers).with_error(error.clone());
    match state.events.trigger(ctx).await {
        Some(response) => response,
        None => default_server_error(&error, state.show_stack_error),
    }
}

/// Router fallback: nothing responded.
pub async fn not_found(events: EventHub, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let ctx = EventContext::new(
        AppEvent::NotFound,
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers,
    );
    match events.trigger(ctx).await {
        Some(response) => response,
        None => default_not_found(&parts.method, &parts.uri),
    }
}

fn default_not_found(method: &axum::http::Method, uri: &axum::http::Uri) -> Response {
    (StatusCode::NOT_FOUND, format!("Cannot {} {}", method, uri.path())).into_response()
}

/// Plain 500; with `show_stack_error` the body lists the error chain.
pub fn default_server_error(error: &RouteError, show_stack_error: bool) -> Response {
    let body = if show_stack_error {
        error.chain().join("\n  caused by: ")
    } else {
        "Internal Server Error".to_string()
    };
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
