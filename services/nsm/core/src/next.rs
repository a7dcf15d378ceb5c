//! Chain of responsibility over network service handlers.
//!
//! A [`Chain`] is an ordered list of [`Handler`]s. Each handler receives the
//! remainder of the chain as a [`Next`] and either delegates to it or returns
//! without calling it, which ends the chain early. `Next` is consumed by the
//! call, so a handler reaches the remainder at most once per call path.

use crate::context::Context;
use crate::error::ChainError;
use async_trait::async_trait;
use nsm_api::{Connection, NetworkServiceRequest};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A link in a handler chain
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle a connection request; delegate through `next` to continue the chain
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
        next: Next,
    ) -> Result<Connection, ChainError>;

    /// Handle a connection close; delegate through `next` to continue the chain
    async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError>;
}

/// Entry point of a complete chain, also the target of heal replays
#[async_trait]
pub trait NetworkService: Send + Sync {
    /// Request a connection
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
    ) -> Result<Connection, ChainError>;

    /// Close a connection
    async fn close(&self, ctx: &Context, conn: &Connection) -> Result<(), ChainError>;
}

/// Remainder of a chain: the shared handler list and the position reached
#[derive(Clone)]
pub struct Next {
    handlers: Arc<[Arc<dyn Handler>]>,
    cursor: usize,
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("cursor", &self.cursor)
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl Next {
    /// Remainder starting at the first of `handlers`
    pub fn new(handlers: Arc<[Arc<dyn Handler>]>) -> Self {
        Self {
            handlers,
            cursor: 0,
        }
    }

    /// Remainder with no handlers left
    pub fn tail() -> Self {
        Self::new(Arc::from(Vec::<Arc<dyn Handler>>::new()))
    }

    /// Number of handlers left in the remainder
    pub fn remaining(&self) -> usize {
        self.handlers.len().saturating_sub(self.cursor)
    }

    /// Whether no handler is left
    pub fn is_tail(&self) -> bool {
        self.remaining() == 0
    }

    fn split(self) -> Option<(Arc<dyn Handler>, Next)> {
        let handler = self.handlers.get(self.cursor)?.clone();
        let rest = Next {
            handlers: self.handlers,
            cursor: self.cursor + 1,
        };
        Some((handler, rest))
    }

    /// Continue the chain with a request.
    ///
    /// Past the last handler the request's connection is returned as is.
    pub async fn request(
        self,
        ctx: &Context,
        request: &NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        match self.split() {
            Some((handler, rest)) => {
                trace!("Request {} entering handler {}", request.connection_id(), rest.cursor - 1);
                handler.request(ctx, request, rest).await
            }
            None => Ok(request.connection.clone().unwrap_or_default()),
        }
    }

    /// Continue the chain with a close
    pub async fn close(self, ctx: &Context, conn: &Connection) -> Result<(), ChainError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        match self.split() {
            Some((handler, rest)) => {
                trace!("Close {} entering handler {}", conn.id, rest.cursor - 1);
                handler.close(ctx, conn, rest).await
            }
            None => Ok(()),
        }
    }
}

/// Ordered handler list usable as a [`NetworkService`]
#[derive(Clone)]
pub struct Chain {
    handlers: Arc<[Arc<dyn Handler>]>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl Chain {
    /// Chain running `handlers` in order
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain has no handlers
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remainder positioned at the first handler
    pub fn start(&self) -> Next {
        Next::new(self.handlers.clone())
    }
}

#[async_trait]
impl NetworkService for Chain {
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        self.start().request(ctx, request).await
    }

    async fn close(&self, ctx: &Context, conn: &Connection) -> Result<(), ChainError> {
        self.start().close(ctx, conn).await
    }
}
