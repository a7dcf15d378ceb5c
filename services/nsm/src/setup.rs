//! Wiring of configured clients.

use crate::config::SdkConfig;
use crate::{component_info, component_warn};
use nsm_core::{Chain, Handler, NetworkService};
use nsm_heal::{HealClient, MonitorConnectionClient};
use nsm_vppagent::{Commit, CommitError};
use std::sync::Arc;

/// Heal client tuned by `config`, consuming `monitor`.
///
/// Must be called inside a tokio runtime.
pub fn heal_client(
    config: &SdkConfig,
    monitor: Arc<dyn MonitorConnectionClient>,
    on_heal: Option<Arc<dyn NetworkService>>,
) -> Arc<HealClient> {
    let heal_config = config.heal_config();
    component_info!(
        "heal",
        "Starting heal client (timeout={:?}, close_on_shutdown={})",
        heal_config.default_heal_timeout,
        heal_config.close_on_shutdown
    );
    Arc::new(HealClient::new(monitor, on_heal, heal_config))
}

/// Commit handler for the vpp-agent described by `config`
pub async fn commit(config: &SdkConfig) -> Result<Commit, CommitError> {
    component_info!("vppagent", "Connecting to vpp-agent at {}", config.vppagent.endpoint);
    Commit::connect(&config.vppagent).await.map_err(|e| {
        component_warn!("vppagent", "vpp-agent at {} unusable: {}", config.vppagent.endpoint, e);
        e
    })
}

/// Client chain with the heal client in front of `handlers`
pub fn client_chain(heal: Arc<HealClient>, handlers: Vec<Arc<dyn Handler>>) -> Chain {
    let mut chain: Vec<Arc<dyn Handler>> = Vec::with_capacity(handlers.len() + 1);
    chain.push(heal);
    chain.extend(handlers);
    Chain::new(chain)
}
