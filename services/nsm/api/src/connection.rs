//! Connection state and the monitor event messages.

use std::collections::HashMap;

/// Mechanism class for a connection served on the local node
pub const MECHANISM_CLASS_LOCAL: &str = "LOCAL";
/// Mechanism class for a connection between forwarders
pub const MECHANISM_CLASS_REMOTE: &str = "REMOTE";
/// Mechanism type for a kernel network interface
pub const MECHANISM_KERNEL_INTERFACE: &str = "KERNEL_INTERFACE";

/// Operational state of a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum State {
    /// Connection is established
    Up = 0,
    /// Connection is known but not carrying traffic
    Down = 1,
}

/// Kind of a monitor event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConnectionEventType {
    /// Full replacement of the connection set
    InitialStateTransfer = 0,
    /// Upsert of the carried connections
    Update = 1,
    /// Removal of the carried connections
    Delete = 2,
}

/// How a connection is plumbed into the client or endpoint
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mechanism {
    /// Mechanism class, LOCAL or REMOTE
    #[prost(string, tag = "1")]
    pub cls: String,
    /// Mechanism type, e.g. KERNEL_INTERFACE
    #[prost(string, tag = "2")]
    pub r#type: String,
    /// Mechanism specific parameters
    #[prost(map = "string, string", tag = "3")]
    pub parameters: HashMap<String, String>,
}

/// A logical connection to a network service
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Connection {
    /// Globally unique connection id
    #[prost(string, tag = "1")]
    pub id: String,
    /// Name of the network service
    #[prost(string, tag = "2")]
    pub network_service: String,
    /// Selected mechanism
    #[prost(message, optional, tag = "3")]
    pub mechanism: Option<Mechanism>,
    /// Free-form labels
    #[prost(map = "string, string", tag = "4")]
    pub labels: HashMap<String, String>,
    /// Operational state
    #[prost(enumeration = "State", tag = "5")]
    pub state: i32,
}

impl Connection {
    /// Create a connection with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the network service name
    pub fn with_network_service(mut self, network_service: impl Into<String>) -> Self {
        self.network_service = network_service.into();
        self
    }

    /// Set the mechanism
    pub fn with_mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = Some(mechanism);
        self
    }
}

impl Mechanism {
    /// Local kernel interface mechanism
    pub fn kernel_interface() -> Self {
        Self {
            cls: MECHANISM_CLASS_LOCAL.to_string(),
            r#type: MECHANISM_KERNEL_INTERFACE.to_string(),
            parameters: HashMap::new(),
        }
    }
}

/// Server pushed change to the set of connections
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectionEvent {
    /// Event kind
    #[prost(enumeration = "ConnectionEventType", tag = "1")]
    pub r#type: i32,
    /// Affected connections keyed by id
    #[prost(map = "string, message", tag = "2")]
    pub connections: HashMap<String, Connection>,
}

impl ConnectionEvent {
    fn with_type<I>(event_type: ConnectionEventType, connections: I) -> Self
    where
        I: IntoIterator<Item = Connection>,
    {
        Self {
            r#type: event_type as i32,
            connections: connections
                .into_iter()
                .map(|conn| (conn.id.clone(), conn))
                .collect(),
        }
    }

    /// Full state transfer carrying every known connection
    pub fn initial_state_transfer<I: IntoIterator<Item = Connection>>(connections: I) -> Self {
        Self::with_type(ConnectionEventType::InitialStateTransfer, connections)
    }

    /// Incremental upsert
    pub fn update<I: IntoIterator<Item = Connection>>(connections: I) -> Self {
        Self::with_type(ConnectionEventType::Update, connections)
    }

    /// Removal of the given connections
    pub fn delete<I: IntoIterator<Item = Connection>>(connections: I) -> Self {
        Self::with_type(ConnectionEventType::Delete, connections)
    }
}

/// Selects which connections a monitor stream reports; empty means all
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MonitorScopeSelector {
    /// Restrict the stream to connections of these network service managers
    #[prost(string, repeated, tag = "1")]
    pub network_service_managers: Vec<String>,
}
