use std::collections::HashMap;

use actix_web::{http::Method, web, HttpRequest, HttpResponse};
use regex::Regex;
use serde_json::Value;

use crate::app_state::AppState;
use crate::db::FileDb;

/// A compiled route template. Segments written as `:name` capture the
/// corresponding path segment; everything else matches literally. The whole
/// path must match, there is no prefix matching.
pub struct RoutePattern {
    regex: Regex,
}

impl RoutePattern {
    pub fn build(pattern: &str) -> Self {
        let param_marker =
            Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("invalid parameter marker regex");

        let mut compiled = String::from("^");
        let mut last = 0;
        for caps in param_marker.captures_iter(pattern) {
            let marker = caps.get(0).expect("capture group 0 always present");
            compiled.push_str(&regex::escape(&pattern[last..marker.start()]));
            compiled.push_str(&format!("(?P<{}>[^/]+)", &caps[1]));
            last = marker.end();
        }
        compiled.push_str(&regex::escape(&pattern[last..]));
        compiled.push('$');

        RoutePattern {
            regex: Regex::new(&compiled).expect("invalid route pattern"),
        }
    }

    /// Tests `path` against the compiled pattern. `None` means no match;
    /// a match returns one entry per named segment (empty for routes
    /// without parameters).
    pub fn capture(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut params = HashMap::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = caps.name(name) {
                params.insert(name.to_string(), value.as_str().to_string());
            }
        }
        Some(params)
    }
}

/// The request envelope a handler sees: path parameters from the matched
/// pattern, the parsed query string, and the parsed JSON body (`Null` when
/// the body is empty or not valid JSON).
pub struct Request {
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

pub type Handler = fn(&FileDb, &Request) -> HttpResponse;

/// One entry of the route table, built once at startup.
pub struct Route {
    pub method: Method,
    pub pattern: RoutePattern,
    pub handler: Handler,
}

impl Route {
    pub fn new(method: Method, pattern: &str, handler: Handler) -> Self {
        Route {
            method,
            pattern: RoutePattern::build(pattern),
            handler,
        }
    }
}

/// Catch-all service: walks the route table in order and invokes the first
/// entry whose method and pattern both match. Anything else is a bare 404.
pub async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<AppState>,
) -> HttpResponse {
    let matched = data.routes.iter().find_map(|route| {
        if route.method != *req.method() {
            return None;
        }
        route.pattern.capture(req.path()).map(|params| (route, params))
    });

    let (route, params) = match matched {
        Some(hit) => hit,
        None => return HttpResponse::NotFound().finish(),
    };

    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    let request = Request { params, query, body };
    (route.handler)(&data.db, &request)
}
