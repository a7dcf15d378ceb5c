//! Call context, serialized executor and handler chain composition for nsm.
//!
//! Every nsm component is a [`Handler`] plugged into a [`Chain`]. A handler
//! receives the call [`Context`], the request or connection, and an explicit
//! [`Next`] holding the remainder of the chain. Components that keep state
//! across calls linearize their bookkeeping through a [`serialize::Executor`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use nsm_api::{Connection, NetworkServiceRequest};
//! use nsm_core::{Chain, ChainError, Context, Handler, NetworkService, Next};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Labeler;
//!
//! #[async_trait]
//! impl Handler for Labeler {
//!     async fn request(
//!         &self,
//!         ctx: &Context,
//!         request: &NetworkServiceRequest,
//!         next: Next,
//!     ) -> Result<Connection, ChainError> {
//!         let mut conn = next.request(ctx, request).await?;
//!         conn.labels.insert("labeled".to_string(), "true".to_string());
//!         Ok(conn)
//!     }
//!
//!     async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError> {
//!         next.close(ctx, conn).await
//!     }
//! }
//!
//! # async fn example() -> Result<(), ChainError> {
//! let chain = Chain::new(vec![Arc::new(Labeler)]);
//! let ctx = Context::background().with_timeout(Duration::from_secs(5));
//! let conn = chain
//!     .request(&ctx, &NetworkServiceRequest::new(Connection::new("conn-1")))
//!     .await?;
//! assert_eq!(conn.labels["labeled"], "true");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod next;
pub mod serialize;

pub use context::Context;
pub use error::ChainError;
pub use next::{Chain, Handler, NetworkService, Next};
pub use serialize::{Executor, ScheduleError};
