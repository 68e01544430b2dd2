use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::common::types::{full, ClientAddr, ProxyBody};
use crate::configuration::Settings;
use crate::selection_method::round_robin::RoundRobin;

// Pause after a failed accept so errors like EMFILE don't spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct LoadBalancer {
    pub listen_addr: SocketAddr,
    selector: RoundRobin,
}

impl LoadBalancer {
    pub fn new(config: Settings) -> Self {
        Self {
            listen_addr: config.listen_addr,
            selector: RoundRobin::new(config.registry),
        }
    }

    /// Select an endpoint and forward to it. Selection and forwarding failures
    /// become 503 and 502 responses; nothing is retried.
    #[tracing::instrument(
        name = "Dispatch request",
        skip_all,
        fields(method = %req.method(), path = %req.uri().path())
    )]
    pub async fn handle(&self, req: Request<ProxyBody>) -> Response<ProxyBody> {
        let endpoint = match self.selector.next() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("{}", e);
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "no upstream endpoint available\n",
                );
            }
        };

        info!(
            backend = endpoint.name(),
            "routing request to URI {:?}",
            endpoint.address()
        );

        match endpoint.forward(req).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Error forwarding to {}: {}", endpoint.address(), e);
                error_response(StatusCode::BAD_GATEWAY, "upstream request failed\n")
            }
        }
    }

    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        tokio::select! {
            _ = self.serve(listener) => {}
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Shutting down");
            }
        }

        Ok(())
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, client_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            let lb = Arc::clone(&self);

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let lb = Arc::clone(&lb);
                    async move {
                        let mut req = req.map(|body| body.boxed());
                        req.extensions_mut().insert(ClientAddr(client_addr));
                        Ok::<_, Infallible>(lb.handle(req).await)
                    }
                });

                if let Err(err) = http1::Builder::new()
                    .preserve_header_case(true)
                    .title_case_headers(true)
                    .serve_connection(TokioIo::new(stream), service)
                    .with_upgrades()
                    .await
                {
                    debug!("Error serving connection from {}: {:?}", client_addr, err);
                }
            });
        }
    }
}

fn error_response(status: StatusCode, message: &'static str) -> Response<ProxyBody> {
    let mut resp = Response::new(full(message));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}
