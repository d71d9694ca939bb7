//! Middleware installed by `init`: parsers, JSONP, static files,
//! compression and views.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::{Extension, Json};
use serde_json::{json, Value};

use modulable_web::http::{Cookies, ParsedBody};
use modulable_web::views::{ViewEngine, ViewError, ViewLocator};
use modulable_web::{RouteError, Views, WebConfig};

mod common;
use common::{body_string, get, post, send, write_file, Fixture};

async fn echo_body(Extension(body): Extension<ParsedBody>) -> Json<Value> {
    Json(body.0)
}

#[tokio::test]
async fn test_cookies_parsed() {
    let mut fixture = Fixture::new(common::plain_config());
    fixture
        .router
        .get("/whoami", |Extension(cookies): Extension<Cookies>| async move {
            cookies.value("sid").unwrap_or("anonymous").to_string()
        })
        .unwrap();
    let router = fixture.build();

    let request = Request::builder()
        .uri("/whoami")
        .header(header::COOKIE, "sid=abc123; theme=dark")
        .body(Body::empty())
        .unwrap();
    assert_eq!(body_string(send(router.clone(), request).await).await, "abc123");
    assert_eq!(body_string(send(router, get("/whoami")).await).await, "anonymous");
}

#[tokio::test]
async fn test_json_and_urlencoded_bodies() {
    let mut fixture = Fixture::new(common::plain_config());
    fixture.router.post("/echo", echo_body).unwrap();
    let router = fixture.build();

    let response = send(router.clone(), post("/echo", "application/json", r#"{"name":"ada"}"#)).await;
    assert_eq!(body_string(response).await, r#"{"name":"ada"}"#);

    let response = send(
        router.clone(),
        post("/echo", "application/x-www-form-urlencoded", "tag=a&tag=b&name=ada+l"),
    )
    .await;
    let parsed: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(parsed, json!({"tag": ["a", "b"], "name": "ada l"}));

    let response = send(router, post("/echo", "text/plain", "hello")).await;
    assert_eq!(body_string(response).await, "{}");
}

#[tokio::test]
async fn test_raw_body_still_readable_after_parsing() {
    let mut fixture = Fixture::new(common::plain_config());
    fixture
        .router
        .post("/raw", |Extension(parsed): Extension<ParsedBody>, raw: String| async move {
            format!("{} {}", parsed["n"], raw)
        })
        .unwrap();

    let response = send(fixture.build(), post("/raw", "application/json", r#"{"n":5}"#)).await;
    assert_eq!(body_string(response).await, r#"5 {"n":5}"#);
}

#[tokio::test]
async fn test_jsonp_wraps_json_responses() {
    let config = WebConfig {
        jsonp: true,
        ..common::plain_config()
    };
    let mut fixture = Fixture::new(config);
    fixture
        .router
        .get("/data", || async { Json(json!({"ok": true})) })
        .unwrap();
    let router = fixture.build();

    let response = send(router.clone(), get("/data?callback=handle")).await;
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/javascript; charset=utf-8"
    );
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(
        body_string(response).await,
        "/**/ typeof handle === 'function' && handle({\"ok\":true});"
    );

    let response = send(router, get("/data")).await;
    assert_eq!(body_string(response).await, r#"{"ok":true}"#);
}

#[tokio::test]
async fn test_jsonp_off_by_default() {
    let mut fixture = Fixture::new(common::plain_config());
    fixture
        .router
        .get("/data", || async { Json(json!({"ok": true})) })
        .unwrap();

    let response = send(fixture.build(), get("/data?callback=handle")).await;
    assert_eq!(body_string(response).await, r#"{"ok":true}"#);
}

fn static_config(root: &Path) -> WebConfig {
    let mut config = WebConfig {
        root: root.to_string_lossy().into_owned(),
        ..common::plain_config()
    };
    config.static_dirs.insert("/public".into(), "public".into());
    config
}

#[tokio::test]
async fn test_static_files_served_and_misses_fall_through() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "public/css/site.css", "body { color: red; }");

    let mut fixture = Fixture::new(static_config(root.path()));
    fixture
        .router
        .get("/public/generated.css", || async { "generated" })
        .unwrap();
    let router = fixture.build();

    let response = send(router.clone(), get("/public/css/site.css")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "body { color: red; }");

    let response = send(router.clone(), get("/public/generated.css")).await;
    assert_eq!(body_string(response).await, "generated");

    let response = send(router, get("/public/missing.css")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Cannot GET /public/missing.css");
}

#[tokio::test]
async fn test_static_mount_ignores_writes() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "public/form.html", "<form></form>");

    let mut fixture = Fixture::new(static_config(root.path()));
    fixture
        .router
        .post("/public/form.html", || async { "submitted" })
        .unwrap();

    let response = send(
        fixture.build(),
        post("/public/form.html", "text/plain", "x"),
    )
    .await;
    assert_eq!(body_string(response).await, "submitted");
}

fn gzip_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_compression_limited_to_text_like() {
    let mut fixture = Fixture::new(WebConfig::default());
    fixture
        .router
        .get("/text", || async { "compress me ".repeat(20) })
        .unwrap()
        .get("/image", || async {
            ([(header::CONTENT_TYPE, "image/png")], vec![0u8; 256]).into_response()
        })
        .unwrap();
    let router = fixture.build();

    let response = send(router.clone(), gzip_get("/text")).await;
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let response = send(router, gzip_get("/image")).await;
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
}

fn views_config(root: &Path) -> WebConfig {
    WebConfig {
        root: root.to_string_lossy().into_owned(),
        template: "classic".to_string(),
        pretty_html: true,
        ..common::plain_config()
    }
}

async fn home(Extension(views): Extension<Views>) -> Result<Html<String>, RouteError> {
    views.render("home", json!({"title": "Welcome"})).await
}

#[tokio::test]
async fn test_views_rendered_from_template_dir() {
    let root = tempfile::tempdir().unwrap();
    write_file(
        root.path(),
        "template/classic/home.html",
        "<h1>{{title}}</h1>{{#if pretty}}<!-- pretty -->{{/if}}",
    );

    let mut fixture = Fixture::new(views_config(root.path()));
    fixture.router.get("/", home).unwrap();

    let response = send(fixture.build(), get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "<h1>Welcome</h1><!-- pretty -->");
}

#[tokio::test]
async fn test_missing_view_raises_500() {
    let root = tempfile::tempdir().unwrap();
    let config = WebConfig {
        show_stack_error: true,
        ..views_config(root.path())
    };
    let mut fixture = Fixture::new(config);
    fixture.router.get("/", home).unwrap();

    let response = send(fixture.build(), get("/")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_string(response)
        .await
        .starts_with("Failed to lookup view \"home\" in views directory"));
}

#[tokio::test]
async fn test_renderer_replaces_engine_and_lookup() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "themes/home.html", "ignored");
    write_file(root.path(), "override/special.tpl", "ignored");

    let mut fixture = Fixture::new(views_config(root.path()));
    fixture.router.get("/", home).unwrap();

    let engine: Arc<dyn ViewEngine> = Arc::new(|path: &Path, locals: &Value| -> Result<String, ViewError> {
        let file = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        Ok(format!("{file}:{}", locals["title"]))
    });
    let special = root.path().join("override/special.tpl");
    let locator: Arc<dyn ViewLocator> = Arc::new(move |name: &str| -> Option<PathBuf> {
        (name == "special").then(|| special.clone())
    });
    fixture
        .app
        .renderer(engine, root.path().join("themes"), locator)
        .unwrap();

    let router = fixture.build();
    let response = send(router, get("/")).await;
    assert_eq!(body_string(response).await, "home.html:\"Welcome\"");

    let views = fixture.app.views().unwrap();
    let Html(html) = views.render("special", json!({"title": "x"})).await.unwrap();
    assert_eq!(html, "special.tpl:\"x\"");
}
