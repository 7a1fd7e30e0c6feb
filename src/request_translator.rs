use crate::cookie_set::{is_known_cookie, CookieSet};
use crate::proxy_error::ProxyError;
use actix_web::web::Query;
use actix_web::HttpRequest;
use bytes::Bytes;
use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, HOST, USER_AGENT};
use reqwest::Method;
use std::collections::HashMap;
use std::str::FromStr;

pub const UPSTREAM_BASE_URL: &str = "https://chat.openai.com";
pub const UPSTREAM_HOST: &str = "chat.openai.com";

/// Query parameter that overrides the target path, stripped from the
/// outbound query string.
const PATH_PARAM: &str = "path";

/// Custom cookie source for clients that cannot set a `Cookie` header.
const CUSTOM_COOKIE_HEADER: &str = "x-chatgpt-cookies";

/// Client headers copied onto the outbound request when present and non-empty.
const FORWARD_HEADERS: [&str; 8] = [
  "content-type",
  "accept",
  "accept-language",
  "accept-encoding",
  "user-agent",
  "referer",
  "origin",
  "x-requested-with",
];

/// Recent Chrome build, sent when the client supplies no User-Agent.
const FALLBACK_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fully-formed descriptor for the upstream call. Built once per inbound
/// request and consumed by the forwarder.
#[derive(Debug)]
pub struct OutboundRequest {
  pub url: String,
  pub method: Method,
  pub headers: HeaderMap,
  pub query: HashMap<String, String>,
  pub body: Option<Bytes>,
}

/// Turns an inbound request into an [`OutboundRequest`]. Fails with
/// [`ProxyError::MissingCredentials`] when any required cookie is absent
/// after merging all cookie sources; no upstream call happens in that case.
pub fn translate(req: &HttpRequest, body: Bytes) -> Result<OutboundRequest, ProxyError> {
  let method = req.method().clone();

  let mut query = parse_query(req);
  let target_path = match query.remove(PATH_PARAM) {
    Some(path) => path,
    None => req.path().to_string(),
  };

  let cookies = collect_cookies(req);
  let missing = cookies.missing_required();
  if !missing.is_empty() {
    return Err(ProxyError::MissingCredentials { missing });
  }

  let mut headers = extract_forward_headers(req);

  if !cookies.is_empty() {
    debug!("Merged {} cookies", cookies.len());

    match HeaderValue::from_str(&cookies.to_header_value()) {
      Ok(value) => {
        headers.insert(COOKIE, value);
      }
      Err(err) => warn!("Unable to serialize cookie header {}", err),
    }
  }

  // Always name the upstream host, regardless of what the client sent.
  headers.insert(HOST, HeaderValue::from_static(UPSTREAM_HOST));

  let body = if keeps_body(&method) { Some(body) } else { None };

  Ok(OutboundRequest {
    url: build_target_url(&target_path),
    method,
    headers,
    query,
    body,
  })
}

fn keeps_body(method: &Method) -> bool {
  matches!(method.as_str(), "POST" | "PUT" | "PATCH")
}

fn parse_query(req: &HttpRequest) -> HashMap<String, String> {
  match Query::<HashMap<String, String>>::from_query(req.query_string()) {
    Ok(query_params) => query_params.0,
    Err(err) => {
      error!("Unable to parse query parameters {}", err);
      HashMap::new()
    }
  }
}

/// Merges the three cookie sources in fixed order; later sources overwrite
/// earlier ones on name collision.
fn collect_cookies(req: &HttpRequest) -> CookieSet {
  let mut cookies = CookieSet::new();

  // Transport-parsed cookies first, filtered to the known name set.
  if let Ok(jar) = req.cookies() {
    for cookie in jar.iter() {
      if is_known_cookie(cookie.name()) {
        cookies.insert(cookie.name(), cookie.value());
      }
    }
  }

  // Raw Cookie header, unfiltered. Needed for cURL and scripted clients.
  if let Some(raw) = header_str(req, COOKIE.as_str()) {
    cookies.merge_header(raw);
  }

  if let Some(raw) = header_str(req, CUSTOM_COOKIE_HEADER) {
    cookies.merge_header(raw);
  }

  cookies
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
  req
    .headers()
    .get(name)
    .and_then(|value| value.to_str().ok())
}

fn extract_forward_headers(req: &HttpRequest) -> HeaderMap {
  let mut headers = HeaderMap::new();

  for name in FORWARD_HEADERS {
    if let Some(value) = req.headers().get(name) {
      if value.is_empty() {
        continue;
      }

      let header_info = (HeaderName::from_str(name), HeaderValue::from_bytes(value.as_bytes()));
      if let (Ok(header_name), Ok(header_value)) = header_info {
        headers.insert(header_name, header_value);
      }
    }
  }

  if !headers.contains_key(USER_AGENT) {
    headers.insert(USER_AGENT, HeaderValue::from_static(FALLBACK_USER_AGENT));
  }

  headers
}

fn build_target_url(path: &str) -> String {
  let stripped = path.trim_start_matches('/');

  if stripped.is_empty() {
    UPSTREAM_BASE_URL.to_string()
  } else {
    format!("{}/{}", UPSTREAM_BASE_URL, stripped)
  }
}
