//! Handler pushing the accumulated configuration to the vpp-agent.

use crate::config::{config, with_config};
use crate::configurator::{Configurator, GrpcConfigurator};
use crate::error::CommitError;
use crate::port::wait_for_port_available;
use crate::proto::Config;
use crate::settings::CommitSettings;
use async_trait::async_trait;
use nsm_api::{Connection, NetworkServiceRequest};
use nsm_core::{ChainError, Context, Handler, Next};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Applies the side-channel configuration on request and retracts it on close
#[derive(Clone)]
pub struct Commit {
    configurator: Arc<dyn Configurator>,
}

impl std::fmt::Debug for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commit").finish_non_exhaustive()
    }
}

impl Commit {
    /// Commit through `configurator`
    pub fn new(configurator: Arc<dyn Configurator>) -> Self {
        Self { configurator }
    }

    /// Wait for the agent, dial it and optionally reset its configuration
    pub async fn connect(settings: &CommitSettings) -> Result<Self, CommitError> {
        let started = Instant::now();
        wait_for_port_available(
            &settings.endpoint,
            settings.connect_timeout(),
            settings.connect_poll_interval(),
        )
        .await?;

        let configurator = GrpcConfigurator::connect(&settings.endpoint).await?;
        info!(
            "vpp-agent at {} ready after {:?}",
            settings.endpoint,
            started.elapsed()
        );

        if settings.reset_on_init {
            let ctx = Context::background().with_timeout(settings.reset_timeout());
            configurator.update(&ctx, &Config::default(), true).await?;
            info!("vpp-agent configuration reset");
        }

        Ok(Self::new(Arc::new(configurator)))
    }

    fn accumulated(ctx: &Context) -> Result<Config, ChainError> {
        match config(ctx) {
            Some(cfg) if !cfg.is_empty() => Ok(cfg.snapshot()),
            _ => Err(chain_error(CommitError::MissingConfig)),
        }
    }
}

fn chain_error(err: CommitError) -> ChainError {
    match err {
        CommitError::Context(err) => err,
        other => ChainError::handler("commit", other),
    }
}

#[async_trait]
impl Handler for Commit {
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
        next: Next,
    ) -> Result<Connection, ChainError> {
        let ctx = with_config(ctx);
        let config = Self::accumulated(&ctx)?;

        if let Err(err) = self.configurator.update(&ctx, &config, false).await {
            warn!(
                "Update for connection {} failed, retracting: {}",
                request.connection_id(),
                err
            );
            if let Err(delete_err) = self.configurator.delete(&ctx, &config).await {
                debug!("Compensating delete failed: {}", delete_err);
            }
            return Err(chain_error(err));
        }
        debug!("Committed config for connection {}", request.connection_id());

        next.request(&ctx, request).await
    }

    async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError> {
        let ctx = with_config(ctx);
        let config = Self::accumulated(&ctx)?;

        self.configurator
            .delete(&ctx, &config)
            .await
            .map_err(chain_error)?;
        debug!("Retracted config for connection {}", conn.id);

        next.close(&ctx, conn).await
    }
}
