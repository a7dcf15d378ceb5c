//! Commit errors.

use nsm_core::ChainError;
use std::time::Duration;
use thiserror::Error;

/// Errors of the vpp-agent commit path
#[derive(Error, Debug)]
pub enum CommitError {
    /// No configuration was accumulated in the call context
    #[error("received empty vpp-agent config")]
    MissingConfig,

    /// The connection has no id to name its interfaces after
    #[error("connection id required to name the tap interface")]
    MissingConnectionId,

    /// The agent could not be dialed or was not ready
    #[error("vpp-agent unavailable: {0}")]
    Unavailable(String),

    /// The agent port did not accept connections in time
    #[error("vpp-agent at {address} not reachable within {timeout:?}")]
    PortUnavailable {
        /// Agent address
        address: String,
        /// How long we waited
        timeout: Duration,
    },

    /// The agent rejected a call
    #[error("vpp-agent call failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The call context ended first
    #[error(transparent)]
    Context(#[from] ChainError),
}
