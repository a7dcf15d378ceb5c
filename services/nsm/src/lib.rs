//! Network service mesh SDK.
//!
//! Connection requests flow through chains of [`Handler`]s. This crate ties
//! the pieces together:
//!
//! - [`nsm_api`]: connection, request and monitor event messages
//! - [`nsm_core`]: call context, serialized executor and chain composition
//! - [`nsm_heal`]: monitor feed and the self-healing client
//! - [`nsm_vppagent`]: side-channel dataplane configuration and the commit handler
//!
//! plus configuration loading ([`config`]), log formatting ([`logging`]) and
//! client wiring ([`setup`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use nsm_sdk::config::SdkConfig;
//! use nsm_sdk::{logging, setup};
//! use nsm_heal::GrpcMonitorClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     logging::init_logging("nsc", "info")?;
//!     let config = SdkConfig::load_from_file("/etc/nsm/sdk.yaml")?;
//!
//!     let monitor = GrpcMonitorClient::connect("http://127.0.0.1:5001").await?;
//!     let heal = setup::heal_client(&config, Arc::new(monitor), None);
//!     let commit = setup::commit(&config).await?;
//!     let _chain = setup::client_chain(
//!         heal,
//!         vec![Arc::new(nsm_vppagent::KernelTap::new()), Arc::new(commit)],
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod logging;
pub mod setup;

pub use nsm_api::{Connection, ConnectionEvent, NetworkServiceRequest};
pub use nsm_core::{Chain, ChainError, Context, Executor, Handler, NetworkService, Next};
pub use nsm_heal::{HealClient, HealConfig};
pub use nsm_vppagent::{Commit, KernelTap};

pub use config::{ConfigError, HealSettings, SdkConfig};
pub use logging::{init_logging, NsmLogFormatter};
