use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{Request, Response, Uri};

use super::error::ForwardingError;
use super::types::{full, ForwardFuture, ProxyBody};
use crate::proxy::backend::Availability;
use crate::proxy::Endpoint;

/// In-process endpoint that answers with its own address instead of talking to
/// an upstream.
#[derive(Debug)]
pub struct StubEndpoint {
    address: String,
    availability: Availability,
    failing: bool,
    probes: AtomicUsize,
    forwarded: AtomicUsize,
}

impl StubEndpoint {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            availability: Availability::default(),
            failing: false,
            probes: AtomicUsize::new(0),
            forwarded: AtomicUsize::new(0),
        }
    }

    pub fn failing(address: &str) -> Self {
        Self {
            failing: true,
            ..Self::new(address)
        }
    }

    pub fn into_endpoint(self) -> Arc<dyn Endpoint> {
        Arc::new(self)
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::SeqCst)
    }
}

impl Endpoint for StubEndpoint {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.availability.is_available()
    }

    fn forward(&self, _req: Request<ProxyBody>) -> ForwardFuture<'_> {
        self.forwarded.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.failing {
                let err = Uri::builder()
                    .scheme("not a scheme")
                    .build()
                    .unwrap_err();
                return Err(ForwardingError::InvalidUpstreamUri(err));
            }
            Ok(Response::new(full(self.address.clone())))
        })
    }
}
