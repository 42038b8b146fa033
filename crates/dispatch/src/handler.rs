use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};

use leasehold_core::AppContext;

use crate::error::HandlerError;
use crate::query::{parse_query, QuerySpec, QueryVerdict};

/// Everything a handler may look at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    /// Named captures from the matched route pattern.
    pub params: HashMap<String, String>,
    /// Decoded query pairs in request order.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Values exposed to every view, merged under the descriptor's package.
    pub locals: Map<String, Value>,
    pub app: AppContext,
}

impl RequestContext {
    pub fn new(app: AppContext, method: Method, uri: Uri) -> Self {
        let query = uri.query().map(parse_query).unwrap_or_default();
        Self {
            method,
            uri,
            params: HashMap::new(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            locals: Map::new(),
            app,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query string, as requested.
    pub fn url(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.uri.path().to_string())
    }

    /// First value of query parameter `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Check this request's query against `spec`. `canonical_path` replaces
    /// the request path when the resource lives elsewhere.
    pub fn verify_query(&self, spec: &QuerySpec, canonical_path: Option<&str>) -> QueryVerdict {
        spec.verify(self.path(), canonical_path, &self.query)
    }

    /// Parse the body as JSON.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn form_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_urlencoded::from_bytes(&self.body)?)
    }
}

/// Produces a response descriptor (as JSON) for a request.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: &RequestContext) -> Result<Value, HandlerError>;
}

/// Closure-backed [`Handler`], built by [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn handle(&self, req: &RequestContext) -> Result<Value, HandlerError> {
        (self.f)(req.clone()).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasehold_store::MemoryStore;

    fn ctx(uri: &str) -> RequestContext {
        let app = AppContext::with_store(Arc::new(MemoryStore::new()));
        RequestContext::new(app, Method::GET, uri.parse().unwrap())
    }

    #[test]
    fn query_and_url() {
        let req = ctx("/search?q=red%20shoes&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.url(), "/search?q=red%20shoes&page=2");
        assert_eq!(req.query_value("q"), Some("red shoes"));
        assert_eq!(req.query_value("page"), Some("2"));
        assert_eq!(req.query_value("missing"), None);
    }

    #[tokio::test]
    async fn closures_become_handlers() {
        let h = handler_fn(|req: RequestContext| async move {
            Ok(serde_json::json!({ "json": { "path": req.path() } }))
        });
        let out = h.handle(&ctx("/a/b")).await.unwrap();
        assert_eq!(out["json"]["path"], "/a/b");
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Signup {
        name: String,
        age: u32,
    }

    #[test]
    fn form_and_json_bodies() {
        let mut req = ctx("/signup");
        req.body = Bytes::from_static(b"name=Ada+Lovelace&age=36");
        assert_eq!(
            req.form_body::<Signup>().unwrap(),
            Signup { name: "Ada Lovelace".into(), age: 36 }
        );
        assert!(req.json_body::<Signup>().is_err());

        req.body = Bytes::from_static(br#"{"name":"Ada","age":36}"#);
        assert_eq!(req.json_body::<Signup>().unwrap().name, "Ada");
        assert!(req.form_body::<Signup>().is_err());
    }
}
