//! Request fingerprints: the identity shared by the in-flight map and the
//! response cache.

use axum::http::Method;

use leasehold_core::lease::cache_key;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Lowercase method; HEAD folds into `get`.
    pub method: String,
    /// Path plus query string exactly as requested.
    pub url: String,
}

impl Fingerprint {
    pub fn new(method: &Method, url: impl Into<String>) -> Self {
        let method = if method == Method::HEAD {
            "get".to_string()
        } else {
            method.as_str().to_ascii_lowercase()
        };
        Self {
            method,
            url: url.into(),
        }
    }

    /// `<prefix>:<method>:<url>`
    pub fn cache_key(&self, prefix: &str) -> String {
        cache_key(prefix, &self.method, &self.url)
    }
}

/// HEAD shares GET's computation but never sends a body.
pub fn sends_body(method: &Method) -> bool {
    method != Method::HEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_folds_into_get() {
        let get = Fingerprint::new(&Method::GET, "/widgets?page=2");
        let head = Fingerprint::new(&Method::HEAD, "/widgets?page=2");
        assert_eq!(get, head);
        assert_eq!(get.cache_key("http_cache"), "http_cache:get:/widgets?page=2");
        assert!(!sends_body(&Method::HEAD));
        assert!(sends_body(&Method::GET));
    }

    #[test]
    fn methods_are_lowercased() {
        let fp = Fingerprint::new(&Method::POST, "/api/orders");
        assert_eq!(fp.method, "post");
        assert_ne!(fp, Fingerprint::new(&Method::GET, "/api/orders"));
    }
}
