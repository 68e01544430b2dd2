use std::sync::Arc;

use crate::common::error::ConfigurationError;
use crate::proxy::Endpoint;

pub mod round_robin;

/// Ordered, non-empty set of endpoints. Built once at startup and never mutated.
#[derive(Debug)]
pub struct Registry {
    endpoints: Vec<Arc<dyn Endpoint>>,
}

impl Registry {
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Result<Self, ConfigurationError> {
        if endpoints.is_empty() {
            return Err(ConfigurationError::NoBackends);
        }
        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> &Arc<dyn Endpoint> {
        &self.endpoints[index % self.endpoints.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Endpoint>> {
        self.endpoints.iter()
    }
}
