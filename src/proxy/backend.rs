use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::{Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use super::{proxy, Endpoint};
use crate::common::error::ConfigurationError;
use crate::common::types::{ForwardFuture, ProxyBody};

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, ProxyBody>;

/// Shared on/off switch; clones observe the same flag.
#[derive(Debug, Clone)]
pub struct Availability(Arc<AtomicBool>);

impl Availability {
    pub fn new(available: bool) -> Self {
        Self(Arc::new(AtomicBool::new(available)))
    }

    pub fn is_available(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_available(&self, available: bool) {
        self.0.store(available, Ordering::Release)
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug)]
pub struct Backend {
    name: String,
    addr: String,
    uri: Uri,
    availability: Availability,
    client: UpstreamClient,
}

impl Backend {
    pub fn new(name: impl Into<String>, addr: &str) -> Result<Backend, ConfigurationError> {
        Self::with_connect_timeout(name, addr, None)
    }

    pub fn with_connect_timeout(
        name: impl Into<String>,
        addr: &str,
        connect_timeout: Option<Duration>,
    ) -> Result<Backend, ConfigurationError> {
        let uri = parse_upstream(addr)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(connect_timeout);
        connector.enforce_http(false);

        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Backend {
            name: name.into(),
            addr: addr.to_string(),
            uri,
            availability: Availability::default(),
            client,
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn availability(&self) -> Availability {
        self.availability.clone()
    }
}

impl Endpoint for Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.addr
    }

    fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    fn forward(&self, req: Request<ProxyBody>) -> ForwardFuture<'_> {
        Box::pin(proxy::forward(&self.client, &self.uri, req))
    }
}

fn parse_upstream(addr: &str) -> Result<Uri, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    };

    let uri: Uri = addr.parse().map_err(|e| invalid(format!("{}", e)))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme {:?}", other))),
        None => return Err(invalid("missing scheme".into())),
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }

    Ok(uri)
}
