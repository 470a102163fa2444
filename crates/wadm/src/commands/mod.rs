//! Command implementations for wadm CLI.

pub mod doctor;
pub mod update;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use wadm_core::UpdateService;
use wadm_core::bridge::ScriptedUpdateService;

use crate::config::Config;

/// Version of the running application
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The update service commands talk to.
pub fn update_service(config: &Config, simulate: bool) -> Result<Arc<dyn UpdateService>> {
    if simulate {
        info!("Using simulated update backend");
        return Ok(Arc::new(ScriptedUpdateService::simulated(CURRENT_VERSION)));
    }
    Ok(Arc::new(config.bridge_client()?))
}
