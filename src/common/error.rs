use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("invalid backend address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("invalid listen address {0:?}")]
    InvalidListenAddr(String),

    #[error("failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("all {0} endpoints are unavailable")]
    AllEndpointsUnavailable(usize),
}

#[derive(Debug, Error)]
pub enum ForwardingError {
    #[error("could not build upstream uri: {0}")]
    InvalidUpstreamUri(#[from] http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}
