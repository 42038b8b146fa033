//! Descriptor → HTTP response translation.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::descriptor::ResponseDescriptor;
use crate::error::DispatchError;
use crate::template::TemplateRenderer;

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";

/// Build the response for `desc`.
///
/// Body precedence is redirect, json, view, package. `content_type`,
/// `status_code` and `ttl` apply whichever body was chosen. With
/// `send_body == false` (HEAD) headers are kept and the body is dropped.
pub fn translate(
    desc: &ResponseDescriptor,
    send_body: bool,
    renderer: &dyn TemplateRenderer,
    locals: &Map<String, Value>,
) -> Result<Response, DispatchError> {
    let mut status = StatusCode::OK;
    let mut location = None;
    let (content_type, body) = if let Some(target) = &desc.redirect {
        status = StatusCode::FOUND;
        location = Some(target.as_str());
        (None, Vec::new())
    } else if let Some(json) = &desc.json {
        let body = serde_json::to_vec(json).map_err(|e| DispatchError::Serialize(e.to_string()))?;
        (Some(JSON), body)
    } else if let Some(view) = &desc.view {
        let body = if send_body {
            renderer.render(view, &view_context(locals, desc.package.as_ref()))?.into_bytes()
        } else {
            Vec::new()
        };
        (Some(HTML), body)
    } else {
        match &desc.package {
            None | Some(Value::Null) => (None, Vec::new()),
            Some(Value::String(s)) => (Some(HTML), s.clone().into_bytes()),
            Some(other) => {
                let body = serde_json::to_vec(other).map_err(|e| DispatchError::Serialize(e.to_string()))?;
                (Some(JSON), body)
            }
        }
    };

    if let Some(code) = desc.status_code {
        status = StatusCode::from_u16(code)
            .map_err(|_| DispatchError::InvalidResult(format!("invalid status_code {}", code)))?;
    }

    let mut builder = Response::builder().status(status);
    if let Some(target) = location {
        builder = builder.header(header::LOCATION, target);
    }
    if let Some(ct) = desc.content_type.as_deref().or(content_type) {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    if let Some(ttl) = desc.cache_ttl() {
        builder = builder.header(header::CACHE_CONTROL, format!("public, max-age={}", ttl));
    }

    let body = if send_body { Body::from(body) } else { Body::empty() };
    builder
        .body(body)
        .map_err(|e| DispatchError::InvalidResult(e.to_string()))
}

/// Request locals with the package's top-level fields layered on top.
fn view_context(locals: &Map<String, Value>, package: Option<&Value>) -> Value {
    let mut ctx = locals.clone();
    if let Some(Value::Object(pkg)) = package {
        for (k, v) in pkg {
            ctx.insert(k.clone(), v.clone());
        }
    }
    Value::Object(ctx)
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Renders the context back as JSON.
    struct EchoRenderer;

    impl TemplateRenderer for EchoRenderer {
        fn render(&self, view: &str, ctx: &Value) -> Result<String, DispatchError> {
            Ok(format!("{}:{}", view, ctx))
        }
    }

    fn desc(v: Value) -> ResponseDescriptor {
        ResponseDescriptor::from_value(v).unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn render(d: &ResponseDescriptor, send_body: bool) -> Response {
        let mut locals = Map::new();
        locals.insert("site".into(), json!("leasehold"));
        locals.insert("title".into(), json!("default"));
        translate(d, send_body, &EchoRenderer, &locals).unwrap()
    }

    #[tokio::test]
    async fn redirect_wins_over_json() {
        let resp = render(&desc(json!({"redirect": "/login", "json": {"a": 1}})), true);
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        assert_eq!(body_string(resp).await, "");
    }

    #[tokio::test]
    async fn json_body() {
        let resp = render(&desc(json!({"json": {"a": 1}, "view": "ignored.html"})), true);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(body_string(resp).await, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn view_merges_package_over_locals() {
        let resp = render(&desc(json!({"view": "page.html", "package": {"title": "Hi", "n": 2}})), true);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], HTML);
        let body = body_string(resp).await;
        let (view, ctx) = body.split_once(':').unwrap();
        assert_eq!(view, "page.html");
        let ctx: Value = serde_json::from_str(ctx).unwrap();
        assert_eq!(ctx, json!({"site": "leasehold", "title": "Hi", "n": 2}));
    }

    #[tokio::test]
    async fn package_string_is_html_and_object_is_json() {
        let resp = render(&desc(json!({"package": "<b>hi</b>"})), true);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], HTML);
        assert_eq!(body_string(resp).await, "<b>hi</b>");

        let resp = render(&desc(json!({"package": [1, 2]})), true);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(body_string(resp).await, "[1,2]");
    }

    #[tokio::test]
    async fn headers_apply_to_every_body_path() {
        let resp = render(
            &desc(json!({
                "package": "id,name",
                "content_type": "text/csv",
                "status_code": 201,
                "ttl": 30
            })),
            true,
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "public, max-age=30");

        let resp = render(&desc(json!({"redirect": "/x", "ttl": 5, "status_code": 301})), true);
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "public, max-age=5");
    }

    #[tokio::test]
    async fn head_keeps_headers_without_body() {
        let resp = render(&desc(json!({"json": {"a": 1}, "ttl": 10})), false);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "public, max-age=10");
        assert_eq!(body_string(resp).await, "");
    }

    #[tokio::test]
    async fn empty_descriptor_is_an_empty_ok() {
        let resp = render(&desc(json!({})), true);
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::CONTENT_TYPE).is_none());
        assert!(resp.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[test]
    fn invalid_status_code_is_rejected() {
        // Only reachable through a cache entry written by an older build.
        let d = ResponseDescriptor {
            status_code: Some(42),
            ..Default::default()
        };
        let err = translate(&d, true, &EchoRenderer, &Map::new()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidResult(_)));
    }

    #[tokio::test]
    async fn errors_become_500() {
        let resp = DispatchError::InvalidResult("null result".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
