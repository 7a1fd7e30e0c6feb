use crate::proxy_error::{ErrorEnvelope, ProxyError};
use crate::upstream_forwarder::UpstreamResponse;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, HttpResponseBuilder};
use log::error;

/// Hop-by-hop and framing headers never copied to the client. The transport
/// already decoded the body and will frame the relayed response itself, so
/// forwarding these verbatim would desynchronize the client.
const SKIP_HEADERS: [&str; 3] = ["transfer-encoding", "connection", "content-encoding"];

/// Copies the upstream status, headers and body onto a client response.
/// Repeated header names (multiple `Set-Cookie` lines) become one header line
/// per value, order preserved.
pub fn relay(upstream: UpstreamResponse) -> HttpResponse {
  let UpstreamResponse {
    status,
    headers,
    body,
  } = upstream;

  let mut builder = HttpResponseBuilder::new(status);

  for (name, value) in headers.iter() {
    if SKIP_HEADERS.contains(&name.as_str()) {
      continue;
    }

    builder.append_header((name.clone(), value.clone()));
  }

  builder.body(body)
}

/// Emits the fixed JSON error envelope. Always a full 500 response; the
/// pipeline never reaches this once relay headers are in flight.
pub fn relay_error(source: &ProxyError) -> HttpResponse {
  let envelope = ErrorEnvelope::from(source);

  let body = match serde_json::to_string_pretty(&envelope) {
    Ok(json) => json,
    Err(err) => {
      error!("Unable to serialize error envelope {}", err);
      String::from("{\n    \"error\": true,\n    \"message\": \"Internal proxy error\",\n    \"code\": 500\n}")
    }
  };

  HttpResponse::InternalServerError()
    .content_type(ContentType::json())
    .body(body)
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;
  use actix_web::http::header;
  use actix_web::http::StatusCode;
  use bytes::Bytes;
  use reqwest::header::{HeaderMap, HeaderValue};

  fn upstream_fixture() -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    headers.append(
      header::SET_COOKIE,
      HeaderValue::from_static("__cf_bm=first; Path=/"),
    );
    headers.append(
      header::SET_COOKIE,
      HeaderValue::from_static("_cfuvid=second; Path=/"),
    );
    headers.insert(
      header::TRANSFER_ENCODING,
      HeaderValue::from_static("chunked"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));

    UpstreamResponse {
      status: StatusCode::OK,
      headers,
      body: Bytes::from_static(b"<html>ok</html>"),
    }
  }

  #[actix_web::test]
  async fn relay_copies_status_headers_and_body() {
    let response = relay(upstream_fixture());

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
      response.headers().get(header::CONTENT_TYPE).unwrap(),
      "text/html"
    );

    let body = to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body, Bytes::from_static(b"<html>ok</html>"));
  }

  #[test]
  fn repeated_set_cookie_lines_survive_in_order() {
    let response = relay(upstream_fixture());

    let cookies: Vec<&str> = response
      .headers()
      .get_all(header::SET_COOKIE)
      .map(|value| value.to_str().unwrap())
      .collect();

    assert_eq!(cookies, vec!["__cf_bm=first; Path=/", "_cfuvid=second; Path=/"]);
  }

  #[test]
  fn excluded_headers_never_reach_the_client() {
    let response = relay(upstream_fixture());

    assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
    assert!(response.headers().get(header::CONNECTION).is_none());
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
  }

  #[test]
  fn upstream_error_status_is_mirrored() {
    let upstream = UpstreamResponse {
      status: StatusCode::UNAUTHORIZED,
      headers: HeaderMap::new(),
      body: Bytes::new(),
    };

    assert_eq!(relay(upstream).status(), StatusCode::UNAUTHORIZED);
  }

  #[actix_web::test]
  async fn error_relay_emits_envelope() {
    let source = ProxyError::MissingCredentials {
      missing: vec!["cf_clearance".to_string()],
    };

    let response = relay_error(&source);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      response.headers().get(header::CONTENT_TYPE).unwrap(),
      "application/json"
    );

    let body = to_bytes(response.into_body()).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["error"], true);
    assert_eq!(json["code"], 500);
    assert!(json["message"]
      .as_str()
      .unwrap()
      .contains("cf_clearance"));
  }
}
