//! Connection monitor RPC: stream traits, the gRPC client and an in-process source.

use async_trait::async_trait;
use nsm_api::{ConnectionEvent, MonitorScopeSelector};
use nsm_core::{ChainError, Context};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

/// gRPC method streaming connection events
pub const MONITOR_CONNECTIONS_PATH: &str = "/connection.MonitorConnection/MonitorConnections";

/// Monitor errors
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The monitor could not be reached or the stream could not be opened
    #[error("monitor unavailable: {0}")]
    Unavailable(String),

    /// The server rejected the monitor call
    #[error("monitor call failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// A single receive on an open stream failed
    #[error("receive failed: {0}")]
    Receive(String),

    /// The call context ended before the stream was opened
    #[error(transparent)]
    Context(#[from] ChainError),
}

/// An open monitor stream
#[async_trait]
pub trait ConnectionEventStream: Send {
    /// Wait for the next event.
    ///
    /// `Ok(None)` means the stream ended; `Err` is a failed receive after which
    /// the stream may still deliver further events.
    async fn next_event(&mut self) -> Result<Option<ConnectionEvent>, MonitorError>;
}

/// Client side of the connection monitor RPC
#[async_trait]
pub trait MonitorConnectionClient: Send + Sync {
    /// Open a stream of connection events living as long as `ctx`
    async fn monitor_connections(
        &self,
        ctx: &Context,
        selector: &MonitorScopeSelector,
    ) -> Result<Box<dyn ConnectionEventStream>, MonitorError>;
}

/// Monitor client over a tonic channel
#[derive(Debug, Clone)]
pub struct GrpcMonitorClient {
    channel: Channel,
}

impl GrpcMonitorClient {
    /// Client using an existing channel
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Dial `endpoint` (e.g. `http://127.0.0.1:5001`) and build a client
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, MonitorError> {
        let endpoint = endpoint.into();
        let channel = Endpoint::from_shared(endpoint.clone())
            .map_err(|e| MonitorError::Unavailable(format!("invalid endpoint {}: {}", endpoint, e)))?
            .connect()
            .await
            .map_err(|e| MonitorError::Unavailable(format!("can't dial {}: {}", endpoint, e)))?;
        info!("Connected to connection monitor at {}", endpoint);
        Ok(Self::new(channel))
    }
}

#[async_trait]
impl MonitorConnectionClient for GrpcMonitorClient {
    async fn monitor_connections(
        &self,
        ctx: &Context,
        selector: &MonitorScopeSelector,
    ) -> Result<Box<dyn ConnectionEventStream>, MonitorError> {
        let mut client = Grpc::new(self.channel.clone());
        ctx.run(client.ready())
            .await?
            .map_err(|e| MonitorError::Unavailable(format!("service was not ready: {}", e)))?;

        let request = tonic::Request::new(selector.clone());
        let codec = ProstCodec::<MonitorScopeSelector, ConnectionEvent>::default();
        let path = PathAndQuery::from_static(MONITOR_CONNECTIONS_PATH);
        let response = ctx
            .run(client.server_streaming(request, path, codec))
            .await??;

        debug!("Monitor stream opened");
        Ok(Box::new(GrpcEventStream {
            inner: response.into_inner(),
        }))
    }
}

struct GrpcEventStream {
    inner: tonic::Streaming<ConnectionEvent>,
}

#[async_trait]
impl ConnectionEventStream for GrpcEventStream {
    async fn next_event(&mut self) -> Result<Option<ConnectionEvent>, MonitorError> {
        self.inner
            .message()
            .await
            .map_err(|status| MonitorError::Receive(status.to_string()))
    }
}

type Item = Result<ConnectionEvent, MonitorError>;

/// In-process monitor source fed through a [`LocalMonitorSender`].
///
/// The stream can be opened once; events sent before it is opened are
/// buffered.
#[derive(Debug)]
pub struct LocalMonitor {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Item>>>,
}

/// Producer side of a [`LocalMonitor`]
#[derive(Debug, Clone)]
pub struct LocalMonitorSender {
    tx: mpsc::UnboundedSender<Item>,
}

impl LocalMonitor {
    /// Create a monitor and the sender feeding it
    pub fn channel() -> (Self, LocalMonitorSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            LocalMonitorSender { tx },
        )
    }
}

impl LocalMonitorSender {
    /// Push an event; false once the stream was dropped
    pub fn send(&self, event: ConnectionEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// Push a receive failure; false once the stream was dropped
    pub fn send_error(&self, err: MonitorError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    /// Whether the stream side was dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct LocalEventStream {
    rx: mpsc::UnboundedReceiver<Item>,
}

#[async_trait]
impl ConnectionEventStream for LocalEventStream {
    async fn next_event(&mut self) -> Result<Option<ConnectionEvent>, MonitorError> {
        match self.rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MonitorConnectionClient for LocalMonitor {
    async fn monitor_connections(
        &self,
        ctx: &Context,
        _selector: &MonitorScopeSelector,
    ) -> Result<Box<dyn ConnectionEventStream>, MonitorError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| MonitorError::Unavailable("local monitor stream already taken".to_string()))?;
        Ok(Box::new(LocalEventStream { rx }))
    }
}
