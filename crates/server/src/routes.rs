//! Controller table and the axum router built from it.
//!
//! Controllers are mapped in ascending priority. The first controller to
//! claim a (method, path) pair keeps it; later claims are logged as
//! conflicts and skipped. Every mapped route is served by the dispatcher.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, Request};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use chrono::Utc;
use serde_json::{Map, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, Level};

use leasehold_dispatch::{Dispatcher, Handler, RequestContext};

/// Largest request body handed to a controller.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Routes under this prefix answer cross-origin requests.
const API_PREFIX: &str = "/api/";

/// A named group of handlers mounted on one or more paths.
pub struct Controller {
    pub name: String,
    pub paths: Vec<String>,
    /// Lower values are mapped first.
    pub priority: i32,
    pub handlers: Vec<(Method, Arc<dyn Handler>)>,
}

impl Controller {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: Vec::new(),
            priority: 0,
            handlers: Vec::new(),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn on(mut self, method: Method, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push((method, handler));
        self
    }

    pub fn get(self, handler: Arc<dyn Handler>) -> Self {
        self.on(Method::GET, handler)
    }

    pub fn post(self, handler: Arc<dyn Handler>) -> Self {
        self.on(Method::POST, handler)
    }
}

/// Rewrite `:name` segments to axum's `{name}` captures.
pub fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) if !name.is_empty() => format!("{{{}}}", name),
            _ => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Route with capture names blanked. `/user/{id}` and `/user/{name}` share
/// a shape and cannot both be mounted.
fn route_shape(route: &str) -> String {
    route
        .split('/')
        .map(|seg| if seg.starts_with('{') && seg.ends_with('}') { "{}" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

/// Values every view can see.
fn base_locals(expose_env: &[String]) -> Map<String, Value> {
    let env: Map<String, Value> = expose_env
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.clone(), Value::String(v))))
        .collect();

    let mut locals = Map::new();
    locals.insert("server_started".into(), Value::from(Utc::now().timestamp_millis()));
    locals.insert("env".into(), Value::Object(env));
    locals
}

#[derive(Default)]
struct RouteTable {
    /// Keyed by shape; holds the first concrete route mounted for it.
    routes: BTreeMap<String, (String, MethodRouter)>,
    /// (method, shape) pairs already claimed.
    mapped: HashSet<(Method, String)>,
}

impl RouteTable {
    fn build(mut controllers: Vec<Controller>, dispatcher: &Arc<Dispatcher>, locals: &Arc<Map<String, Value>>) -> Self {
        controllers.sort_by_key(|c| c.priority);

        let mut table = Self::default();
        for controller in controllers {
            for path in &controller.paths {
                for (method, handler) in &controller.handlers {
                    table.add(&controller.name, method, path, handler, dispatcher, locals);
                }
            }
        }
        table
    }

    fn add(
        &mut self,
        controller: &str,
        method: &Method,
        path: &str,
        handler: &Arc<dyn Handler>,
        dispatcher: &Arc<Dispatcher>,
        locals: &Arc<Map<String, Value>>,
    ) {
        if !path.starts_with('/') {
            error!("{}: path '{}' must start with '/', ignoring", controller, path);
            return;
        }
        let filter = match MethodFilter::try_from(method.clone()) {
            Ok(f) => f,
            Err(_) => {
                error!("{}: method {} cannot be routed, ignoring", controller, method);
                return;
            }
        };
        let route = axum_path(path);
        let shape = route_shape(&route);
        if let Some((existing, _)) = self.routes.get(&shape) {
            if *existing != route {
                error!("CONFLICT: {} {} clashes with {}! Ignoring...", method, path, existing);
                return;
            }
        }
        if !self.mapped.insert((method.clone(), shape.clone())) {
            error!("CONFLICT: {} {} has already been mapped! Ignoring...", method, path);
            return;
        }
        debug!("Mapped {} {} to {}", method, path, controller);

        let endpoint = endpoint(filter, Arc::clone(dispatcher), Arc::clone(handler), Arc::clone(locals));
        let merged = match self.routes.remove(&shape) {
            Some((_, existing)) => existing.merge(endpoint),
            None => endpoint,
        };
        self.routes.insert(shape, (route, merged));
    }
}

fn endpoint(
    filter: MethodFilter,
    dispatcher: Arc<Dispatcher>,
    handler: Arc<dyn Handler>,
    locals: Arc<Map<String, Value>>,
) -> MethodRouter {
    on(filter, move |params: Option<Path<HashMap<String, String>>>, request: Request| {
        serve(
            Arc::clone(&dispatcher),
            Arc::clone(&handler),
            Arc::clone(&locals),
            params.map(|Path(p)| p).unwrap_or_default(),
            request,
        )
    })
}

async fn serve(
    dispatcher: Arc<Dispatcher>,
    handler: Arc<dyn Handler>,
    locals: Arc<Map<String, Value>>,
    params: HashMap<String, String>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };

    let mut req = RequestContext::new(dispatcher.context().clone(), parts.method, parts.uri);
    req.headers = parts.headers;
    req.body = body;
    req.params = params;
    req.locals = (*locals).clone();
    req.locals.insert("path".into(), Value::String(req.path().to_string()));

    dispatcher.dispatch(&handler, req).await
}

/// Assemble the full application router.
///
/// Controller routes come first, then static files from `www/public`.
pub fn router(dispatcher: Arc<Dispatcher>, controllers: Vec<Controller>) -> Router {
    let config = dispatcher.context().config().clone();
    let locals = Arc::new(base_locals(&config.server.expose_env));
    let table = RouteTable::build(controllers, &dispatcher, &locals);

    let mut api = Router::new();
    let mut site = Router::new();
    for (path, method_router) in table.routes.into_values() {
        if path.starts_with(API_PREFIX) {
            api = api.route(&path, method_router);
        } else {
            site = site.route(&path, method_router);
        }
    }

    let mut app = site
        .merge(api.layer(CorsLayer::permissive()))
        .fallback_service(ServeDir::new(config.app.public_dir()));

    if config.server.http_logging {
        app = app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );
    }
    app
}
