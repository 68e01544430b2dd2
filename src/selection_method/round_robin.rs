use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tracing::debug;

use super::Registry;
use crate::common::error::SelectionError;
use crate::proxy::Endpoint;

/// Round-robin over a [`Registry`], skipping endpoints that report themselves
/// unavailable.
///
/// The cursor is a single atomic counter, so concurrent callers each claim a
/// distinct slot of one global sequence. `fetch_add` wraps on overflow and the
/// cursor is only ever used modulo the registry length. Every probe, skipped or
/// not, advances the cursor, and a call gives up after one full lap.
#[derive(Debug)]
pub struct RoundRobin {
    registry: Arc<Registry>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> Result<Arc<dyn Endpoint>, SelectionError> {
        let len = self.registry.len();

        for _ in 0..len {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            let endpoint = self.registry.get(index);
            if endpoint.is_available() {
                return Ok(Arc::clone(endpoint));
            }
            debug!(index, address = endpoint.address(), "skipping unavailable endpoint");
        }

        Err(SelectionError::AllEndpointsUnavailable(len))
    }
}
