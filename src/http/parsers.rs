//! Cookie and body parsing middleware.
//!
//! Each parser attaches its result to the request extensions so handlers can
//! take `Extension<Cookies>` or `Extension<ParsedBody>`. The raw body is put
//! back after parsing, so axum's own extractors keep working.

use std::ops::Deref;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::CookieJar;
use serde_json::{Map, Value};

use crate::error::RouteError;

/// Cookies sent with the request.
#[derive(Debug, Default, Clone)]
pub struct Cookies(CookieJar);

impl Deref for Cookies {
    type Target = CookieJar;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Cookies {
    /// Value of the named cookie.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|c| c.value())
    }
}

impl From<&HeaderMap> for Cookies {
    fn from(headers: &HeaderMap) -> Self {
        let mut jar = CookieJar::new();
        let cookies = headers
            .get_all(header::COOKIE)
            .into_iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .map(str::trim)
            .filter(|cookie| !cookie.is_empty())
            .filter_map(|cookie| cookie::Cookie::parse_encoded(cookie.to_owned()).ok());

        for cookie in cookies {
            jar.add_original(cookie);
        }

        Self(jar)
    }
}

/// Parsed request body. `{}` when no parser matched the content type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl Default for ParsedBody {
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl Deref for ParsedBody {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Marks a body as consumed by one parser so the next one skips it.
#[derive(Debug, Clone, Copy)]
struct BodyParsed;

/// Maximum body size accepted by the parsers.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid urlencoded body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
}

pub async fn cookie_parser(mut request: Request, next: Next) -> Response {
    let cookies = Cookies::from(request.headers());
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

pub async fn json_parser(
    State(limit): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Response {
    parse_body(limit, request, next, is_json, |bytes| {
        if bytes.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_slice(bytes)?)
    })
    .await
}

pub async fn urlencoded_parser(
    State(limit): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Response {
    parse_body(limit, request, next, is_urlencoded, |bytes| {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)?;
        Ok(pairs_to_object(pairs))
    })
    .await
}

async fn parse_body<F>(
    limit: BodyLimit,
    mut request: Request,
    next: Next,
    matches: fn(&str) -> bool,
    parse: F,
) -> Response
where
    F: FnOnce(&[u8]) -> Result<Value, BodyError>,
{
    if request.extensions().get::<ParsedBody>().is_none() {
        request.extensions_mut().insert(ParsedBody::default());
    }
    if request.extensions().get::<BodyParsed>().is_some()
        || !content_type(request.headers()).is_some_and(matches)
    {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, limit.0).await {
        Ok(bytes) => bytes,
        Err(e) => return RouteError::new(BodyError::Read(e)).into_response(),
    };
    let value = match parse(&bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Body parse failed");
            return RouteError::new(e).into_response();
        }
    };

    parts.extensions.insert(ParsedBody(value));
    parts.extensions.insert(BodyParsed);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
}

fn is_json(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

fn is_urlencoded(mime: &str) -> bool {
    mime.eq_ignore_ascii_case("application/x-www-form-urlencoded")
}

/// Repeated keys collect into an array, in request order.
fn pairs_to_object(pairs: Vec<(String, String)>) -> Value {
    let mut object = Map::new();
    for (key, value) in pairs {
        match object.get_mut(&key) {
            None => {
                object.insert(key, Value::String(value));
            }
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    Value::Object(object)
}
