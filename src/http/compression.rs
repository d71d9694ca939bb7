//! Response compression for text-like content.

use axum::http::{header, Extensions, HeaderMap, StatusCode, Version};
use tower_http::compression::CompressionLayer;
use tower_http::CompressionLevel;

/// Content types worth compressing.
const TEXT_LIKE: [&str; 4] = ["json", "text", "javascript", "css"];

/// Predicate deciding whether a response is compressed.
pub type TextLike = fn(StatusCode, Version, &HeaderMap, &Extensions) -> bool;

/// True when the response `Content-Type` mentions json, text, javascript or
/// css. Responses without a content type are left alone.
pub fn is_text_like(_: StatusCode, _: Version, headers: &HeaderMap, _: &Extensions) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| TEXT_LIKE.iter().any(|kind| ct.contains(kind)))
        .unwrap_or(false)
}

/// Compression at the best level, limited to text-like responses.
pub fn compression_layer() -> CompressionLayer<TextLike> {
    CompressionLayer::new()
        .quality(CompressionLevel::Best)
        .compress_when(is_text_like as TextLike)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn check(content_type: Option<&'static str>) -> bool {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        is_text_like(StatusCode::OK, Version::HTTP_11, &headers, &Extensions::new())
    }

    #[test]
    fn test_text_like_types() {
        assert!(check(Some("application/json")));
        assert!(check(Some("text/html; charset=utf-8")));
        assert!(check(Some("application/javascript")));
        assert!(check(Some("text/css")));
    }

    #[test]
    fn test_binary_and_missing_types() {
        assert!(!check(Some("image/png")));
        assert!(!check(Some("application/octet-stream")));
        assert!(!check(None));
    }
}
