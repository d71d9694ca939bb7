//! JSONP callback support.
//!
//! When enabled, a JSON response to a request carrying `?callback=name` is
//! rewritten into a script invoking that function.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::RouteError;

const CALLBACK_PARAM: &str = "callback";

pub async fn jsonp(request: Request, next: Next) -> Response {
    let callback = request.uri().query().and_then(callback_name);
    let response = next.run(request).await;

    let Some(callback) = callback else {
        return response;
    };
    if !is_json_response(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return RouteError::new(e).into_response(),
    };

    let wrapped = wrap(&callback, &String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/javascript; charset=utf-8"),
    );
    parts
        .headers
        .insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    Response::from_parts(parts, Body::from(wrapped))
}

/// The sanitized callback name, when present and non-empty.
fn callback_name(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    let raw = pairs.into_iter().find(|(k, _)| k == CALLBACK_PARAM)?.1;
    let name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
        .collect();
    (!name.is_empty()).then_some(name)
}

fn is_json_response(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn wrap(callback: &str, json: &str) -> String {
    let json = json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029");
    format!("/**/ typeof {callback} === 'function' && {callback}({json});")
}
