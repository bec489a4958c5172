use crate::http::{HttpRequest, HttpResponse, Method};
use std::collections::HashMap;

pub type Handler = fn(&HttpRequest) -> HttpResponse;

/// A single parameterized route: `{name}` segments capture a path
/// component by name; every other segment must match literally.
pub struct RoutePattern {
    pub original_pattern: String,
    pub segments: Vec<String>,
    pub param_names: Vec<String>,
    pub handler: Handler,
}

impl RoutePattern {
    pub fn new(pattern: &str, handler: Handler) -> Self {
        let segments: Vec<String> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let param_names = segments
            .iter()
            .filter_map(|s| Self::param_name(s))
            .collect();
        Self {
            original_pattern: pattern.to_string(),
            segments,
            param_names,
            handler,
        }
    }

    fn param_name(segment: &str) -> Option<String> {
        if segment.len() >= 3 && segment.starts_with('{') && segment.ends_with('}') {
            Some(segment[1..segment.len() - 1].to_string())
        } else {
            None
        }
    }

    /// Matches `path` against this pattern. On success, `params_out` is
    /// populated with the captured `{name}` values. Literal segments are
    /// compared for equality against the corresponding path segment - a
    /// mismatch on a literal fails the whole match rather than being
    /// skipped.
    pub fn matches(&self, path: &str, params_out: &mut HashMap<String, String>) -> bool {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if path_segments.len() != self.segments.len() {
            return false;
        }
        let mut extracted = HashMap::new();
        for (pattern_segment, path_segment) in self.segments.iter().zip(path_segments.iter()) {
            match Self::param_name(pattern_segment) {
                Some(name) => {
                    extracted.insert(name, (*path_segment).to_string());
                }
                None if pattern_segment == path_segment => {}
                None => return false,
            }
        }
        *params_out = extracted;
        true
    }
}

/// Two-tier router: an O(1) exact table for literal routes, and an ordered
/// per-method list of parameterized patterns checked in insertion order
/// when no exact route matches.
pub struct Router {
    exact: HashMap<(Method, String), Handler>,
    parameterized: HashMap<Method, Vec<RoutePattern>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            parameterized: HashMap::new(),
        }
    }

    /// Registers `handler` for `method`/`pattern`. A pattern containing a
    /// `{name}` segment is routed to the parameterized table; everything
    /// else is an exact route. Re-registering the same exact route
    /// overwrites the previous handler (last insertion wins).
    pub fn add_route(&mut self, method: Method, pattern: &str, handler: Handler) {
        if pattern.split('/').any(|s| RoutePattern::param_name(s).is_some()) {
            self.parameterized
                .entry(method)
                .or_default()
                .push(RoutePattern::new(pattern, handler));
        } else {
            self.exact.insert((method, pattern.to_string()), handler);
        }
    }

    /// Resolves `method`/`path`: exact routes first, then parameterized
    /// routes in registration order. Populates `request.path_params` on a
    /// parameterized match.
    pub fn match_route(&self, request: &mut HttpRequest) -> Option<Handler> {
        let method = request.method;
        let path = request.route.clone();

        if let Some(handler) = self.exact.get(&(method, path.clone())) {
            request.path_params.clear();
            return Some(*handler);
        }

        if let Some(patterns) = self.parameterized.get(&method) {
            for pattern in patterns {
                let mut params = HashMap::new();
                if pattern.matches(&path, &mut params) {
                    request.path_params = params;
                    return Some(pattern.handler);
                }
            }
        }

        None
    }

    pub fn get(&mut self, pattern: &str, handler: Handler) {
        self.add_route(Method::Get, pattern, handler);
    }
    pub fn post(&mut self, pattern: &str, handler: Handler) {
        self.add_route(Method::Post, pattern, handler);
    }
    pub fn put(&mut self, pattern: &str, handler: Handler) {
        self.add_route(Method::Put, pattern, handler);
    }
    pub fn delete(&mut self, pattern: &str, handler: Handler) {
        self.add_route(Method::Delete, pattern, handler);
    }
    pub fn head(&mut self, pattern: &str, handler: Handler) {
        self.add_route(Method::Head, pattern, handler);
    }
    pub fn options(&mut self, pattern: &str, handler: Handler) {
        self.add_route(Method::Options, pattern, handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_ok(_req: &HttpRequest) -> HttpResponse {
        HttpResponse::ok("ok")
    }

    fn make_request(method: Method, route: &str) -> HttpRequest {
        HttpRequest {
            method,
            full_route: route.to_string(),
            route: route.to_string(),
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            path_params: HashMap::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn exact_route_matches_and_method_mismatch_does_not() {
        let mut router = Router::new();
        router.get("/hello/world", handler_ok);

        assert!(router
            .match_route(&mut make_request(Method::Get, "/hello/world"))
            .is_some());
        assert!(router
            .match_route(&mut make_request(Method::Get, "/hello"))
            .is_none());
        assert!(router
            .match_route(&mut make_request(Method::Post, "/hello/world"))
            .is_none());
    }

    #[test]
    fn parameterized_route_extracts_path_params() {
        let mut router = Router::new();
        router.get("/users/{id}", handler_ok);

        let mut req = make_request(Method::Get, "/users/123");
        assert!(router.match_route(&mut req).is_some());
        assert_eq!(req.get_path_param("id"), Some("123"));
    }

    #[test]
    fn literal_segments_must_match_exactly_not_be_skipped() {
        let mut router = Router::new();
        router.get("/users/{id}/posts", handler_ok);

        let mut mismatched = make_request(Method::Get, "/users/123/comments");
        assert!(router.match_route(&mut mismatched).is_none());

        let mut matched = make_request(Method::Get, "/users/123/posts");
        assert!(router.match_route(&mut matched).is_some());
        assert_eq!(matched.get_path_param("id"), Some("123"));
    }

    #[test]
    fn exact_routes_take_priority_over_parameterized() {
        let mut router = Router::new();
        fn exact_handler(_: &HttpRequest) -> HttpResponse {
            HttpResponse::ok("exact")
        }
        fn param_handler(_: &HttpRequest) -> HttpResponse {
            HttpResponse::ok("param")
        }
        router.get("/users/{id}", param_handler);
        router.get("/users/me", exact_handler);

        let mut req = make_request(Method::Get, "/users/me");
        let handler = router.match_route(&mut req).unwrap();
        assert_eq!((handler)(&req).body, b"exact");
    }

    #[test]
    fn unknown_route_does_not_match() {
        let router = Router::new();
        assert!(router
            .match_route(&mut make_request(Method::Get, "/nope"))
            .is_none());
    }

    #[test]
    fn reinserting_an_exact_route_overwrites_the_previous_handler() {
        let mut router = Router::new();
        fn first(_: &HttpRequest) -> HttpResponse {
            HttpResponse::ok("first")
        }
        fn second(_: &HttpRequest) -> HttpResponse {
            HttpResponse::ok("second")
        }
        router.get("/dup", first);
        router.get("/dup", second);

        let mut req = make_request(Method::Get, "/dup");
        let handler = router.match_route(&mut req).unwrap();
        assert_eq!((handler)(&req).body, b"second");
    }
}
