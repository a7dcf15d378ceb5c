//! Dataplane configuration accumulation, vpp-agent commit and kernel tap handlers for nsm.
//!
//! Mechanism handlers such as [`KernelTap`] add interfaces to the
//! [`VppAgentConfig`] carried by the call context. The [`Commit`] handler
//! pushes the accumulated configuration to the vpp-agent on request and
//! retracts it on close.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commit;
pub mod config;
pub mod configurator;
pub mod error;
pub mod kernel_tap;
pub mod port;
pub mod proto;
pub mod settings;

pub use commit::Commit;
pub use config::{config, with_config, VppAgentConfig};
pub use configurator::{Configurator, GrpcConfigurator};
pub use error::CommitError;
pub use kernel_tap::KernelTap;
pub use port::wait_for_port_available;
pub use settings::CommitSettings;
