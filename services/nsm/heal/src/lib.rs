//! Connection monitor feed and the self-healing chain client for nsm.
//!
//! The [`HealClient`] is a chain [`Handler`](nsm_core::Handler) that remembers
//! how to re-issue every connection it saw succeed, watches the control
//! plane's connection monitor stream, and re-requests connections whose
//! backing state disappears from that stream.
//!
//! ## Features
//!
//! - **Monitor feed**: [`MonitorFeed`] turns a monitor stream into events,
//!   skippable receive errors and a terminal condition
//! - **Reconciliation**: events are folded into a reported-state map on a
//!   serialized executor, followed by an absence sweep
//! - **Repair**: requestors run as detached tasks with the budget left on the
//!   original request's deadline
//! - **Teardown**: [`HealClient::shutdown`] cancels the monitor exactly once
//!   and optionally closes every tracked connection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod feed;
pub mod monitor;
pub mod state;

pub use client::{HealClient, HealConfig};
pub use feed::{FeedItem, MonitorFeed};
pub use monitor::{
    ConnectionEventStream, GrpcMonitorClient, LocalMonitor, LocalMonitorSender,
    MonitorConnectionClient, MonitorError,
};
pub use state::TrackedState;
