//! The shared route table behind the router facade.
//!
//! Routes are collected until the server is built, then frozen into an axum
//! `Router`. Patterns use axum syntax (`/users/{id}`, `/files/{*path}`) and
//! are checked against axum's rules when registered, so building never fails.
//!
//! Precedence follows registration order. A request is served by the earliest
//! registration whose pattern covers the request path and whose verb covers
//! the method:
//! - a registration already covered by an earlier one is shadowed;
//! - a more specific pattern registered later keeps only the methods no
//!   earlier covering pattern handles; the rest still reach the earlier one;
//! - `all` on a pattern answers every method not claimed before it.
//!
//! Each method is routed separately, so a handler only ever sees the captures
//! of its own pattern, and a path known only for other methods is a plain
//! miss rather than a 405.
//!
//! Patterns that only partly overlap (`/{a}/new` and `/users/{b}`) are left
//! to axum, which prefers static segments.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::Request,
    handler::Handler,
    http::Method,
    routing::{any, on, MethodFilter, MethodRouter},
    Router,
};
use tower::ServiceExt;

/// HTTP verb a route is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    /// Every method.
    All,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::All => "ALL",
        }
    }

    /// Whether a registration for `self` answers requests meant for `other`.
    fn covers(self, other: Verb) -> bool {
        self == Verb::All || self == other
    }

    fn method_router<H, T>(self, handler: H) -> MethodRouter
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        match self {
            Verb::Get => on(MethodFilter::GET, handler),
            Verb::Post => on(MethodFilter::POST, handler),
            Verb::Put => on(MethodFilter::PUT, handler),
            Verb::Delete => on(MethodFilter::DELETE, handler),
            Verb::All => any(handler),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// An earlier registration already answers every request this one could.
    Shadowed,
    /// The table was already built into a server.
    Frozen,
}

/// A pattern axum would refuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid route pattern {pattern:?}: {reason}")]
pub struct InvalidPattern {
    pub pattern: String,
    pub reason: String,
}

struct RouteEntry {
    verb: Verb,
    pattern: String,
    router: MethodRouter,
}

struct RouteTable {
    entries: Vec<RouteEntry>,
    /// Distinct patterns, in the order they were accepted.
    patterns: Vec<String>,
    /// Every accepted pattern, inserted in order; mirrors what `build` does.
    check: Router,
    frozen: bool,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            patterns: Vec::new(),
            check: Router::new(),
            frozen: false,
        }
    }
}

/// Handle to the route table; clones share the same table.
#[derive(Clone, Default)]
pub struct RouterHandle {
    table: Arc<Mutex<RouteTable>>,
}

impl RouterHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RouteTable> {
        self.table.lock().expect("route table mutex poisoned")
    }

    /// Register `handler` for `verb` on `pattern`.
    pub fn add<H, T>(&self, verb: Verb, pattern: &str, handler: H) -> Result<Registration, InvalidPattern>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let mut guard = self.lock();
        let table = &mut *guard;
        if table.frozen {
            tracing::warn!(verb = %verb, pattern, "Route registered after start, ignoring");
            return Ok(Registration::Frozen);
        }

        check_syntax(pattern)?;

        if let Some(earlier) = table
            .entries
            .iter()
            .find(|e| e.verb.covers(verb) && generalizes(&e.pattern, pattern))
        {
            tracing::warn!(
                verb = %verb,
                pattern,
                covered_by = %earlier.pattern,
                "Route shadowed by an earlier registration"
            );
            return Ok(Registration::Shadowed);
        }

        if !table.patterns.iter().any(|p| p == pattern) {
            if let Some(same_shape) = table
                .patterns
                .iter()
                .find(|p| generalizes(p, pattern) && generalizes(pattern, p))
            {
                tracing::warn!(
                    verb = %verb,
                    pattern,
                    conflicts_with = %same_shape,
                    "Route conflicts with an earlier pattern, keeping the first"
                );
                return Ok(Registration::Shadowed);
            }

            let check = table.check.clone();
            match panic::catch_unwind(AssertUnwindSafe(|| check.route(pattern, any(|| async {})))) {
                Ok(check) => table.check = check,
                Err(payload) => {
                    let reason = panic_message(payload);
                    if reason.contains("conflict") {
                        tracing::warn!(verb = %verb, pattern, reason = %reason, "Route conflicts, keeping the first");
                        return Ok(Registration::Shadowed);
                    }
                    return Err(InvalidPattern {
                        pattern: pattern.to_string(),
                        reason,
                    });
                }
            }
            table.patterns.push(pattern.to_string());
        }

        table.entries.push(RouteEntry {
            verb,
            pattern: pattern.to_string(),
            router: verb.method_router(handler),
        });
        Ok(Registration::Added)
    }

    /// Registered `(verb, pattern)` pairs in registration order.
    pub fn routes(&self) -> Vec<(Verb, String)> {
        self.lock()
            .entries
            .iter()
            .map(|e| (e.verb, e.pattern.clone()))
            .collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.lock().frozen
    }

    /// Freeze the table and build the axum router.
    ///
    /// Every method is routed by its own router, so a request only ever
    /// matches patterns registered for its method; `not_found` answers the
    /// rest.
    pub(crate) fn build(&self, not_found: Option<MethodRouter>) -> Router {
        let mut table = self.lock();
        table.frozen = true;

        let for_method = |method: Option<Verb>| {
            let router = table.router_for(method);
            match &not_found {
                Some(not_found) => router.fallback_service(not_found.clone()),
                None => router,
            }
        };
        let dispatch = MethodDispatch {
            get: for_method(Some(Verb::Get)),
            post: for_method(Some(Verb::Post)),
            put: for_method(Some(Verb::Put)),
            delete: for_method(Some(Verb::Delete)),
            other: for_method(None),
        };

        Router::new().fallback(move |request: Request| {
            let router = dispatch.select(request.method()).clone();
            router.oneshot(request)
        })
    }
}

impl RouteTable {
    /// Per pattern, the first registration answering `method`. `None` stands
    /// for methods without a verb of their own, which only `all` answers.
    fn router_for(&self, method: Option<Verb>) -> Router {
        let answers = |verb: Verb| match method {
            Some(method) => verb.covers(method),
            None => verb == Verb::All,
        };

        let mut router = Router::new();
        for pattern in &self.patterns {
            let first = self
                .entries
                .iter()
                .find(|e| &e.pattern == pattern && answers(e.verb));
            if let Some(entry) = first {
                router = router.route(pattern, entry.router.clone());
            }
        }
        router
    }
}

#[derive(Clone)]
struct MethodDispatch {
    get: Router,
    post: Router,
    put: Router,
    delete: Router,
    other: Router,
}

impl MethodDispatch {
    fn select(&self, method: &Method) -> &Router {
        match method {
            &Method::GET | &Method::HEAD => &self.get,
            &Method::POST => &self.post,
            &Method::PUT => &self.put,
            &Method::DELETE => &self.delete,
            _ => &self.other,
        }
    }
}

/// Rules axum enforces with a panic that are cheap to check up front.
fn check_syntax(pattern: &str) -> Result<(), InvalidPattern> {
    let invalid = |reason: &str| InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    if !pattern.starts_with('/') {
        return Err(invalid("paths must start with a `/`"));
    }
    if pattern.split('/').any(|s| s.starts_with(':') || s.starts_with('*')) {
        return Err(invalid("captures use `{name}` or `{*name}`"));
    }
    Ok(())
}

enum Segment<'a> {
    Literal(&'a str),
    Param,
    CatchAll,
}

fn segment(raw: &str) -> Segment<'_> {
    let capture = raw
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|inner| !inner.is_empty() && !inner.contains(|c: char| c == '{' || c == '}'));
    match capture {
        Some(inner) if inner.starts_with('*') => Segment::CatchAll,
        Some(_) => Segment::Param,
        None => Segment::Literal(raw),
    }
}

/// Whether every path matched by `specific` is also matched by `general`.
///
/// Segments mixing text and captures are compared literally.
fn generalizes(general: &str, specific: &str) -> bool {
    let mut general = general.split('/').map(segment);
    let mut specific = specific.split('/').map(segment);
    loop {
        match (general.next(), specific.next()) {
            (None, None) => return true,
            (Some(Segment::CatchAll), Some(s)) => {
                return !matches!(s, Segment::Literal(""));
            }
            (Some(Segment::Param), Some(Segment::Param | Segment::Literal(_))) => {}
            (Some(Segment::Literal(g)), Some(Segment::Literal(s))) if g == s => {}
            _ => return false,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    "rejected by the router".to_string()
}
