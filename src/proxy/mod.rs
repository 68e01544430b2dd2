use std::fmt;

use http::Request;

use crate::common::types::{ForwardFuture, ProxyBody};

pub mod backend;
pub mod load_balancer;
pub mod proxy;

pub use backend::{Availability, Backend};
pub use load_balancer::LoadBalancer;

pub trait Endpoint: fmt::Debug + Send + Sync {
    fn name(&self) -> &str {
        self.address()
    }

    fn address(&self) -> &str;

    fn is_available(&self) -> bool;

    fn forward(&self, req: Request<ProxyBody>) -> ForwardFuture<'_>;
}
