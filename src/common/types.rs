use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};

use super::error::ForwardingError;

pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

pub type ForwardFuture<'a> =
    Pin<Box<dyn Future<Output = Result<http::Response<ProxyBody>, ForwardingError>> + Send + 'a>>;

// Set as a request extension by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub fn full<T: Into<Bytes>>(chunk: T) -> ProxyBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}
