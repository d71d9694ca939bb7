//! The router facade: one route table mounted on the app, plus the
//! `'404'` / `'500'` terminal handlers.

use axum::handler::Handler;

use crate::error::FacadeError;
use crate::facade::AppFacade;
use crate::host::events::{EventHub, Notification};
use crate::http::routes::{Registration, RouterHandle, Verb};
use crate::observability::metrics;

pub struct RouterFacade {
    events: EventHub,
    handle: Option<RouterHandle>,
}

impl RouterFacade {
    pub fn new(events: EventHub) -> Self {
        Self {
            events,
            handle: None,
        }
    }

    /// Mount the route table on `app`, then the error classifier and the
    /// catch-all 404 after it.
    pub fn init(&mut self, app: &mut AppFacade) -> Result<&mut Self, FacadeError> {
        if self.handle.is_some() {
            return Err(FacadeError::AlreadyInitialized("router"));
        }

        let handle = RouterHandle::new();
        app.server_mut()?
            .mount_router(handle.clone())
            .use_error_handler(self.events.clone())
            .use_not_found(self.events.clone());

        tracing::debug!("Router mounted");
        self.handle = Some(handle);
        Ok(self)
    }

    /// Alias of [`init`](Self::init).
    pub fn ready(&mut self, app: &mut AppFacade) -> Result<&mut Self, FacadeError> {
        self.init(app)
    }

    pub fn handle(&self) -> Option<&RouterHandle> {
        self.handle.as_ref()
    }

    pub fn get<H, T>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, FacadeError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Get, pattern, handler)
    }

    pub fn post<H, T>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, FacadeError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Post, pattern, handler)
    }

    pub fn put<H, T>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, FacadeError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Put, pattern, handler)
    }

    pub fn delete<H, T>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, FacadeError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::Delete, pattern, handler)
    }

    /// Register `handler` for every method.
    pub fn all<H, T>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, FacadeError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Verb::All, pattern, handler)
    }

    fn route<H, T>(&mut self, verb: Verb, pattern: &str, handler: H) -> Result<&mut Self, FacadeError>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let handle = self.handle.as_ref().ok_or(FacadeError::NotInitialized("router"))?;

        if handle.add(verb, pattern, handler)? == Registration::Added {
            tracing::debug!(method = %verb, pattern, "Route registered");
            metrics::record_route(verb.as_str());
            self.events.publish(Notification::RouteRegistered {
                method: verb.to_string(),
                pattern: pattern.to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebConfig;
    use crate::http::StackItem;
    use std::sync::Arc;

    #[test]
    fn test_registration_before_init() {
        let mut router = RouterFacade::new(EventHub::new());
        assert!(matches!(
            router.get("/", || async { "home" }),
            Err(FacadeError::NotInitialized("router"))
        ));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let mut app = AppFacade::new(Arc::new(WebConfig::default()));
        app.init().unwrap();
        let mut router = RouterFacade::new(EventHub::new());
        router.init(&mut app).unwrap();

        let Err(err) = router.get("users", || async { "list" }) else {
            panic!("pattern without a leading slash was accepted");
        };
        assert!(matches!(err, FacadeError::InvalidPattern(ref p) if p.pattern == "users"));
        app.build_router().unwrap();
    }

    #[test]
    fn test_init_mounts_router_then_terminal_handlers() {
        let config = WebConfig {
            compression: false,
            ..WebConfig::default()
        };
        let mut app = AppFacade::new(Arc::new(config));
        app.init().unwrap();
        let mut router = RouterFacade::new(EventHub::new());
        router.init(&mut app).unwrap();

        let stack = app.server().unwrap().stack();
        assert_eq!(
            &stack[stack.len() - 3..],
            &[StackItem::Router, StackItem::ErrorHandler, StackItem::NotFound]
        );
        assert!(matches!(
            router.init(&mut app),
            Err(FacadeError::AlreadyInitialized("router"))
        ));
    }

    #[tokio::test]
    async fn test_registration_publishes_notification() {
        let events = EventHub::new();
        let mut notifications = events.subscribe();
        let mut app = AppFacade::new(Arc::new(WebConfig::default()));
        app.init().unwrap();
        let mut router = RouterFacade::new(events);
        router.init(&mut app).unwrap();

        router
            .get("/users", || async { "list" })
            .unwrap()
            .post("/users", || async { "create" })
            .unwrap();

        assert_eq!(
            notifications.recv().await.unwrap(),
            Notification::RouteRegistered {
                method: "GET".into(),
                pattern: "/users".into()
            }
        );
        assert_eq!(router.handle().unwrap().routes().len(), 2);
    }
}
