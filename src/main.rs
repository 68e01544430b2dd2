use std::sync::Arc;

use color_eyre::eyre::Result;
use tracing::info;

use trafficman::prelude::*;
use trafficman::utils::tracing::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let settings = Settings::new()?;
    for endpoint in settings.registry.iter() {
        info!("Backend {} -> {}", endpoint.name(), endpoint.address());
    }

    let load_balancer = Arc::new(LoadBalancer::new(settings));
    load_balancer.run().await?;

    Ok(())
}
