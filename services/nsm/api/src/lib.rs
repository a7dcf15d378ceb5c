//! Connection, request and monitor event messages shared by every nsm crate.
//!
//! The types are prost messages so they travel unchanged over the monitor
//! stream and can be carried by any chain handler. They are value-like:
//! handlers clone them before changing a field.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod networkservice;

pub use connection::*;
pub use networkservice::*;
