//! vpp-agent configurator RPC.

use crate::error::CommitError;
use crate::proto::{Config, DeleteRequest, DeleteResponse, UpdateRequest, UpdateResponse};
use async_trait::async_trait;
use nsm_core::Context;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

/// gRPC method applying a configuration
pub const UPDATE_PATH: &str = "/ligato.configurator.ConfiguratorService/Update";
/// gRPC method retracting a configuration
pub const DELETE_PATH: &str = "/ligato.configurator.ConfiguratorService/Delete";

/// Client side of the vpp-agent configurator
#[async_trait]
pub trait Configurator: Send + Sync {
    /// Apply `config`; with `full_resync` everything else the agent holds is dropped
    async fn update(&self, ctx: &Context, config: &Config, full_resync: bool) -> Result<(), CommitError>;

    /// Retract `config`
    async fn delete(&self, ctx: &Context, config: &Config) -> Result<(), CommitError>;
}

/// Configurator over a tonic channel
#[derive(Debug, Clone)]
pub struct GrpcConfigurator {
    channel: Channel,
}

impl GrpcConfigurator {
    /// Configurator using an existing channel
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Dial the agent at `endpoint` (host:port)
    pub async fn connect(endpoint: &str) -> Result<Self, CommitError> {
        let uri = format!("http://{}", endpoint);
        let channel = Endpoint::from_shared(uri.clone())
            .map_err(|e| CommitError::Unavailable(format!("invalid endpoint {}: {}", uri, e)))?
            .connect()
            .await
            .map_err(|e| CommitError::Unavailable(format!("can't dial {}: {}", uri, e)))?;
        info!("Connected to vpp-agent at {}", uri);
        Ok(Self::new(channel))
    }

    async fn unary<Req, Resp>(
        &self,
        ctx: &Context,
        path: &'static str,
        message: Req,
    ) -> Result<Resp, CommitError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut client = Grpc::new(self.channel.clone());
        ctx.run(client.ready())
            .await?
            .map_err(|e| CommitError::Unavailable(format!("service was not ready: {}", e)))?;

        let mut request = tonic::Request::new(message);
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }
        let codec = ProstCodec::<Req, Resp>::default();
        let response = ctx
            .run(client.unary(request, PathAndQuery::from_static(path), codec))
            .await??;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl Configurator for GrpcConfigurator {
    async fn update(&self, ctx: &Context, config: &Config, full_resync: bool) -> Result<(), CommitError> {
        debug!(
            "Sending Update with {} interfaces (full_resync={})",
            config.interfaces.len(),
            full_resync
        );
        let request = UpdateRequest {
            update: Some(config.clone()),
            full_resync,
        };
        let _: UpdateResponse = self.unary(ctx, UPDATE_PATH, request).await?;
        Ok(())
    }

    async fn delete(&self, ctx: &Context, config: &Config) -> Result<(), CommitError> {
        debug!("Sending Delete with {} interfaces", config.interfaces.len());
        let request = DeleteRequest {
            delete: Some(config.clone()),
        };
        let _: DeleteResponse = self.unary(ctx, DELETE_PATH, request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_bad_endpoint() {
        let err = GrpcConfigurator::connect("bad endpoint").await.unwrap_err();
        assert!(matches!(err, CommitError::Unavailable(_)));
    }
}
