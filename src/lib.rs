pub mod common;
pub mod configuration;
pub mod proxy;
pub mod selection_method;
pub mod utils;

pub mod prelude {
    pub use crate::common::error::{ConfigurationError, ForwardingError, SelectionError};
    pub use crate::common::types::ProxyBody;
    pub use crate::configuration::Settings;
    pub use crate::proxy::{Availability, Backend, Endpoint, LoadBalancer};
    pub use crate::selection_method::{round_robin::RoundRobin, Registry};
}
