//! The host serving over a real socket.

use axum::http::StatusCode as AxumStatus;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use modulable_web::host::BoxError;
use modulable_web::{AppEvent, Core, Host, Lifecycle, Plugin, RouteError, Shutdown, WebConfig};

mod common;
use common::write_file;

struct Api;

impl Plugin for Api {
    fn name(&self) -> &str {
        "api"
    }

    fn on_init(&mut self, core: &mut Core) -> Result<(), BoxError> {
        core.router
            .get("/api/users/{id}", |axum::extract::Path(id): axum::extract::Path<u32>| async move {
                if id == 1 {
                    Ok(Json(json!({"id": 1, "name": "ada"})))
                } else {
                    Err(RouteError::not_found(format!("user {id}")))
                }
            })?
            .post("/api/echo", |Json(body): Json<Value>| async move { Json(body) })?;

        core.events.on(AppEvent::NotFound, |ctx| async move {
            Some((AxumStatus::NOT_FOUND, format!("nothing at {}", ctx.uri.path())).into_response())
        });
        Ok(())
    }
}

fn config(root: &std::path::Path) -> WebConfig {
    let mut config = WebConfig {
        root: root.to_string_lossy().into_owned(),
        host: "127.0.0.1".to_string(),
        ..WebConfig::default()
    };
    config.static_dirs.insert("/static".into(), "assets".into());
    config
}

#[tokio::test]
async fn test_host_serves_routes_static_and_404() {
    let root = tempfile::tempdir().unwrap();
    write_file(root.path(), "assets/hello.txt", "hello from disk");

    let mut host = Host::new(config(root.path())).plugin(Api);
    host.emit(Lifecycle::Init).await.unwrap();
    let shutdown = Shutdown::new();
    let running = host.core_mut().app.listen(0, shutdown.subscribe()).await.unwrap();
    let base = format!("http://{}", running.local_addr());
    let client = reqwest::Client::new();

    let response = client.get(format!("{base}/api/users/1")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["name"], "ada");

    let response = client.get(format!("{base}/api/users/9")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "nothing at /api/users/9");

    let response = client
        .post(format!("{base}/api/echo"))
        .json(&json!({"ping": true}))
        .send()
        .await
        .unwrap();
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed, json!({"ping": true}));

    let response = client.get(format!("{base}/static/hello.txt")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "hello from disk");

    drop(client);
    shutdown.trigger();
    running.wait().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let root = tempfile::tempdir().unwrap();
    let config = WebConfig {
        port: 0,
        ..config(root.path())
    };
    std::env::remove_var(modulable_web::facade::PORT_ENV);

    let mut host = Host::new(config);
    let addr = host.boot().await.unwrap();
    assert_eq!(host.local_addr(), Some(addr));

    let status = reqwest::get(format!("http://{addr}/nothing")).await.unwrap().status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

    host.shutdown();
    host.wait().await.unwrap();
    assert!(reqwest::get(format!("http://{addr}/nothing")).await.is_err());
}
