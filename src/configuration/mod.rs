use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::common::error::ConfigurationError;
use crate::proxy::{Backend, Endpoint};
use crate::selection_method::Registry;

#[derive(Debug, Deserialize)]
pub struct RawSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub backends: Vec<RawBackend>,
}

#[derive(Debug, Deserialize)]
pub struct RawBackend {
    pub name: Option<String>,
    pub addr: String,
    /// Static drain switch; a backend configured unavailable never receives traffic.
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".into()
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub registry: Arc<Registry>,
}

impl Settings {
    /// Reads `config.toml`, then a file named after `RUN_MODE`, then
    /// `TRAFFICMAN__*` environment variables, later sources winning.
    pub fn new() -> Result<Self, ConfigurationError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let builder = Config::builder()
            .add_source(File::with_name("config").required(run_mode == "production"))
            .add_source(File::with_name(&run_mode).required(false))
            .add_source(
                Environment::with_prefix("TRAFFICMAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_raw(builder.try_deserialize()?)
    }

    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigurationError> {
        let listen_addr = raw
            .listen_addr
            .parse()
            .map_err(|_| ConfigurationError::InvalidListenAddr(raw.listen_addr.clone()))?;

        let connect_timeout = raw.connect_timeout_ms.map(Duration::from_millis);
        let backends = raw
            .backends
            .into_iter()
            .map(|backend| -> Result<Arc<dyn Endpoint>, ConfigurationError> {
                let name = backend.name.unwrap_or_else(|| backend.addr.clone());
                let built = Backend::with_connect_timeout(name, &backend.addr, connect_timeout)?;
                built.availability().set_available(backend.available);
                Ok(Arc::new(built))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            listen_addr,
            registry: Arc::new(Registry::new(backends)?),
        })
    }
}
