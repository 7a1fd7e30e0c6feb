use crate::proxy_error::ProxyError;
use crate::request_translator::OutboundRequest;
use bytes::Bytes;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;

/// Egress client settings. TLS verification stays on reqwest defaults and is
/// deliberately not configurable here.
pub struct HttpClientConfig {
  pub http_proxy: Option<String>,
  pub user: Option<String>,
  pub pass: Option<String>,
}

impl HttpClientConfig {
  pub fn to_client(self) -> Result<Client, reqwest::Error> {
    let HttpClientConfig {
      http_proxy,
      user,
      pass,
    } = self;
    let mut client_builder = reqwest::ClientBuilder::new()
      .timeout(REQUEST_TIMEOUT)
      .connect_timeout(CONNECT_TIMEOUT)
      .redirect(Policy::limited(MAX_REDIRECTS));

    if let Some(proxy_url) = http_proxy {
      let mut proxy = reqwest::Proxy::all(proxy_url)?;

      if let (Some(user_name), Some(password)) = (user, pass) {
        proxy = proxy.basic_auth(&user_name, &password);
      }

      client_builder = client_builder.proxy(proxy);
    }

    client_builder.build()
  }
}

/// Owned snapshot of the upstream reply. `headers` keeps repeated names (for
/// example multiple `Set-Cookie` lines) as distinct entries in arrival order;
/// the body is already decoded from whatever content-encoding the upstream
/// negotiated.
#[derive(Debug)]
pub struct UpstreamResponse {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Bytes,
}

/// Executes the outbound request once. Every transport failure (DNS, connect,
/// TLS, timeout) surfaces as [`ProxyError::Transport`]; nothing is retried.
pub async fn forward(client: &Client, outbound: OutboundRequest) -> Result<UpstreamResponse, ProxyError> {
  let OutboundRequest {
    url,
    method,
    headers,
    query,
    body,
  } = outbound;

  debug!("Forwarding {} {}", &method, &url);

  let mut builder = client.request(method, &url).headers(headers);

  if !query.is_empty() {
    builder = builder.query(&query);
  }

  if let Some(bytes) = body {
    builder = builder.body(bytes);
  }

  let response = builder.send().await.map_err(ProxyError::transport)?;

  let status = response.status();
  let headers = response.headers().clone();
  let body = response.bytes().await.map_err(ProxyError::transport)?;

  debug!("Upstream answered {} with {} bytes", status, body.len());

  Ok(UpstreamResponse {
    status,
    headers,
    body,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_builds_without_proxy() {
    let config = HttpClientConfig {
      http_proxy: None,
      user: None,
      pass: None,
    };

    assert!(config.to_client().is_ok());
  }

  #[test]
  fn client_builds_with_authenticated_proxy() {
    let config = HttpClientConfig {
      http_proxy: Some("socks5://127.0.0.1:1080".to_string()),
      user: Some("user".to_string()),
      pass: Some("pass".to_string()),
    };

    assert!(config.to_client().is_ok());
  }
}
