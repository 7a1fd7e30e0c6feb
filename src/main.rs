mod cookie_set;
mod proxy_error;
mod request_translator;
mod response_relay;
mod std_logger;
mod upstream_forwarder;

use actix_cors::Cors;
use actix_web::ResponseError;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use bytes::Bytes;
use clap::Parser;
use futures_core::Stream;
use futures_util::StreamExt;
use log::{error, info, LevelFilter};
use reqwest::Client;
use std::io::{ErrorKind, Result};

use proxy_error::ProxyError;
use upstream_forwarder::{HttpClientConfig, UpstreamResponse};

/// Reverse proxy for the ChatGPT web interface. Forwards any request to
/// chat.openai.com with the caller's authentication cookies reattached.
#[derive(Parser)]
#[command(name = "chatgpt_proxy")]
struct ProxyArgs {
    #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "HTTP_WORKER_COUNT", default_value_t = 4)]
    workers: usize,

    /// Optional egress proxy (http, https or socks5 scheme).
    #[arg(long, env = "HTTP_PROXY_URL")]
    proxy_url: Option<String>,

    #[arg(long, env = "HTTP_PROXY_USER")]
    proxy_user: Option<String>,

    #[arg(long, env = "HTTP_PROXY_PASS")]
    proxy_pass: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

struct AppState {
    client: Client,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = ProxyArgs::parse();

    std_logger::init(args.log_level)
        .map_err(|error| std::io::Error::new(ErrorKind::Other, error))?;

    let client_config = HttpClientConfig {
        http_proxy: args.proxy_url,
        user: args.proxy_user,
        pass: args.proxy_pass,
    };

    let client = client_config
        .to_client()
        .map_err(|error| std::io::Error::new(ErrorKind::Other, error))?;

    info!(
        "Proxying {}:{} to {}.",
        &args.bind,
        args.port,
        request_translator::UPSTREAM_BASE_URL
    );

    let state = web::Data::new(AppState { client });

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .default_service(web::to(handler))
    })
    .workers(args.workers)
    .bind((args.bind, args.port))?
    .run()
    .await
}

async fn handler(
    req: HttpRequest,
    mut payload: web::Payload,
    data: web::Data<AppState>,
) -> HttpResponse {
    let body = {
        let (size, _) = payload.size_hint();
        let mut body_buffer: Vec<u8> = Vec::with_capacity(size);

        while let Some(chunk) = payload.next().await {
            match chunk {
                Ok(bytes) => body_buffer.extend_from_slice(&bytes),
                Err(err) => {
                    error!("Reading request body failed {}", err);
                    return err.error_response();
                }
            }
        }

        Bytes::from(body_buffer)
    };

    match exec(&req, body, &data.client).await {
        Ok(upstream) => response_relay::relay(upstream),
        Err(err) => {
            error!("{}", err);
            response_relay::relay_error(&err)
        }
    }
}

async fn exec(req: &HttpRequest, body: Bytes, client: &Client) -> std::result::Result<UpstreamResponse, ProxyError> {
    let outbound = request_translator::translate(req, body)?;
    upstream_forwarder::forward(client, outbound).await
}
