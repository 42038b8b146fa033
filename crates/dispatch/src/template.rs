//! View rendering for descriptors that name a template.
//!
//! View sources are read from `<base>/www/views/<view>` once and kept in a
//! per-renderer cache; a fresh [`minijinja::Environment`] renders each call,
//! with autoescaping chosen from the view's extension.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::error::DispatchError;

/// Renders a named view with a JSON context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, view: &str, ctx: &Value) -> Result<String, DispatchError>;
}

/// File-backed renderer over a views directory.
#[derive(Debug)]
pub struct ViewRenderer {
    views_dir: PathBuf,
    sources: RwLock<HashMap<String, Arc<str>>>,
}

impl ViewRenderer {
    pub fn new(views_dir: impl Into<PathBuf>) -> Self {
        Self {
            views_dir: views_dir.into(),
            sources: RwLock::new(HashMap::new()),
        }
    }

    pub fn views_dir(&self) -> &Path {
        &self.views_dir
    }

    /// Drop every cached source so the next render re-reads from disk.
    pub fn clear(&self) {
        self.sources
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn source(&self, view: &str) -> Result<Arc<str>, DispatchError> {
        if let Some(src) = self
            .sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(view)
        {
            return Ok(Arc::clone(src));
        }

        let rel = Path::new(view);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(DispatchError::Template(format!("invalid view path: {}", view)));
        }
        let path = self.views_dir.join(rel);
        let src: Arc<str> = std::fs::read_to_string(&path)
            .map_err(|e| DispatchError::Template(format!("{}: {}", path.display(), e)))?
            .into();
        debug!(view = %view, "loaded view");

        self.sources
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(view.to_string(), Arc::clone(&src));
        Ok(src)
    }

    fn build_env<'source>() -> minijinja::Environment<'source> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env
    }
}

impl TemplateRenderer for ViewRenderer {
    fn render(&self, view: &str, ctx: &Value) -> Result<String, DispatchError> {
        let src = self.source(view)?;
        let mut env = Self::build_env();
        env.add_template(view, &src)?;
        Ok(env.get_template(view)?.render(ctx)?)
    }
}

/// Round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_and_caches_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.html"), "<p>{{ name }} {{ score | round(1) }}</p>").unwrap();
        let r = ViewRenderer::new(dir.path());

        let out = r.render("hello.html", &json!({"name": "Ada", "score": 2.26})).unwrap();
        assert_eq!(out, "<p>Ada 2.3</p>");

        // Cached: the file is no longer needed.
        std::fs::remove_file(dir.path().join("hello.html")).unwrap();
        assert!(r.render("hello.html", &json!({"name": "Bob", "score": 1})).is_ok());

        r.clear();
        assert!(r.render("hello.html", &json!({})).is_err());
    }

    #[test]
    fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let r = ViewRenderer::new(dir.path());
        let err = r.render("../secret.html", &json!({})).unwrap_err();
        assert!(matches!(err, DispatchError::Template(_)));
    }

    #[test]
    fn missing_view_is_a_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = ViewRenderer::new(dir.path());
        assert!(matches!(r.render("nope.html", &json!({})), Err(DispatchError::Template(_))));
    }
}
