//! Query-string verification and canonicalization.
//!
//! A resource declares which query parameters it understands. Requests that
//! carry extra, misordered or out-of-range parameters are redirected to the
//! canonical URL so the response cache sees one key per resource; requests
//! with values that cannot be repaired get a 404.

use std::collections::BTreeMap;

/// Type of one accepted query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Any non-empty value.
    String,
    /// A value starting with an integer.
    Integer,
    /// One of the listed values; the first is the default.
    OneOf(Vec<String>),
    /// Exactly this value.
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryVerdict {
    Valid,
    /// Serve a redirect to this canonical URL instead.
    Redirect(String),
    NotFound,
}

#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    params: BTreeMap<String, ParamKind>,
    required: Vec<String>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.insert(name.into(), kind);
        self
    }

    pub fn required(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.params.insert(name, kind);
        self
    }

    /// Verify `query` (in request order) for a request to `path`.
    pub fn verify(
        &self,
        path: &str,
        canonical_path: Option<&str>,
        query: &[(String, String)],
    ) -> QueryVerdict {
        let base = canonical_path.unwrap_or(path);
        if base != path {
            return QueryVerdict::Redirect(self.rebuild(base, query));
        }

        for name in &self.required {
            if lookup(query, name).map_or(true, str::is_empty) {
                return QueryVerdict::Redirect(self.rebuild(base, query));
            }
        }

        let mut rebuild = false;
        let mut last_key: Option<&str> = None;
        for (key, value) in query {
            if last_key.is_some_and(|last| key.as_str() <= last) {
                rebuild = true;
            }
            last_key = Some(key.as_str());

            if value.is_empty() {
                return QueryVerdict::NotFound;
            }
            match self.params.get(key) {
                None => rebuild = true,
                Some(ParamKind::String) => {}
                Some(ParamKind::Integer) => {
                    if !starts_with_integer(value) {
                        return QueryVerdict::NotFound;
                    }
                }
                Some(ParamKind::OneOf(choices)) => {
                    if !choices.iter().any(|c| c == value) {
                        rebuild = true;
                    }
                }
                Some(ParamKind::Exact(expected)) => {
                    if value != expected {
                        rebuild = true;
                    }
                }
            }
        }

        if rebuild {
            QueryVerdict::Redirect(self.rebuild(base, query))
        } else {
            QueryVerdict::Valid
        }
    }

    /// Canonical URL: known parameters only, repaired where possible,
    /// required ones filled with defaults, keys sorted.
    fn rebuild(&self, base: &str, query: &[(String, String)]) -> String {
        let mut out: BTreeMap<&str, String> = BTreeMap::new();
        for (name, kind) in &self.params {
            let given = lookup(query, name).filter(|v| !v.is_empty());
            let required = self.required.iter().any(|r| r == name);
            if given.is_none() && !required {
                continue;
            }
            let value = match kind {
                ParamKind::String => given.unwrap_or_default().to_string(),
                ParamKind::Integer => given.unwrap_or("0").to_string(),
                ParamKind::OneOf(choices) => match given {
                    Some(v) if choices.iter().any(|c| c == v) => v.to_string(),
                    _ => choices.first().cloned().unwrap_or_default(),
                },
                ParamKind::Exact(v) => v.clone(),
            };
            out.insert(name.as_str(), value);
        }

        if out.is_empty() {
            return base.to_string();
        }
        let pairs: Vec<String> = out
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", base, pairs.join("&"))
    }
}

fn lookup<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn starts_with_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Split and percent-decode a raw query string. `+` decodes to a space.
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    match urlencoding::decode(&s) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(raw: &str) -> Vec<(String, String)> {
        parse_query(raw)
    }

    fn listing() -> QuerySpec {
        QuerySpec::new()
            .required("sort", ParamKind::OneOf(vec!["new".into(), "top".into()]))
            .param("page", ParamKind::Integer)
            .param("tag", ParamKind::String)
    }

    #[test]
    fn ordered_known_params_are_valid() {
        let v = listing().verify("/list", None, &q("page=2&sort=top&tag=red"));
        assert_eq!(v, QueryVerdict::Valid);
    }

    #[test]
    fn misordered_params_redirect_sorted() {
        let v = listing().verify("/list", None, &q("tag=red&sort=top&page=2"));
        assert_eq!(v, QueryVerdict::Redirect("/list?page=2&sort=top&tag=red".into()));
    }

    #[test]
    fn unknown_params_are_dropped() {
        let v = listing().verify("/list", None, &q("sort=new&utm=x"));
        assert_eq!(v, QueryVerdict::Redirect("/list?sort=new".into()));
    }

    #[test]
    fn missing_required_gets_default() {
        let v = listing().verify("/list", None, &q("page=3"));
        assert_eq!(v, QueryVerdict::Redirect("/list?page=3&sort=new".into()));
    }

    #[test]
    fn invalid_choice_falls_back_to_first() {
        let v = listing().verify("/list", None, &q("sort=old"));
        assert_eq!(v, QueryVerdict::Redirect("/list?sort=new".into()));
    }

    #[test]
    fn empty_or_non_integer_values_are_not_found() {
        assert_eq!(listing().verify("/list", None, &q("page=&sort=new")), QueryVerdict::NotFound);
        assert_eq!(listing().verify("/list", None, &q("page=abc&sort=new")), QueryVerdict::NotFound);
        assert_eq!(listing().verify("/list", None, &q("page=12abc&sort=new")), QueryVerdict::Valid);
    }

    #[test]
    fn canonical_path_mismatch_redirects() {
        let v = listing().verify("/old-list", Some("/list"), &q("sort=top"));
        assert_eq!(v, QueryVerdict::Redirect("/list?sort=top".into()));
    }

    #[test]
    fn exact_values_are_enforced() {
        let spec = QuerySpec::new().param("v", ParamKind::Exact("2".into()));
        assert_eq!(spec.verify("/api", None, &q("v=2")), QueryVerdict::Valid);
        assert_eq!(spec.verify("/api", None, &q("v=1")), QueryVerdict::Redirect("/api?v=2".into()));
    }

    #[test]
    fn no_params_rebuilds_to_bare_path() {
        let spec = QuerySpec::new();
        assert_eq!(spec.verify("/", None, &q("x=1")), QueryVerdict::Redirect("/".into()));
        assert_eq!(spec.verify("/", None, &[]), QueryVerdict::Valid);
    }

    #[test]
    fn parse_query_decodes() {
        assert_eq!(
            parse_query("a=1&b=red+shoes&c=%C3%A9&flag"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "red shoes".to_string()),
                ("c".to_string(), "é".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }
}
