//! vpp-agent configurator messages.

/// Interface kinds understood by the vpp-agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum InterfaceType {
    /// Not set
    Undefined = 0,
    /// Loopback interface
    SoftwareLoopback = 2,
    /// Shared memory interface
    Memif = 4,
    /// TAP interface with a kernel side
    Tap = 5,
    /// Host interface bound through AF_PACKET
    AfPacket = 6,
    /// VXLAN tunnel
    VxlanTunnel = 7,
}

/// Kernel side of a TAP interface
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TapLink {
    /// TAP driver version
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// Name of the kernel interface
    #[prost(string, tag = "2")]
    pub host_if_name: String,
}

/// A VPP interface
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Interface {
    /// Unique logical name
    #[prost(string, tag = "1")]
    pub name: String,
    /// Interface kind
    #[prost(enumeration = "InterfaceType", tag = "2")]
    pub r#type: i32,
    /// Admin state
    #[prost(bool, tag = "3")]
    pub enabled: bool,
    /// Addresses in CIDR notation
    #[prost(string, repeated, tag = "4")]
    pub ip_addresses: Vec<String>,
    /// TAP specific settings
    #[prost(message, optional, tag = "5")]
    pub tap: Option<TapLink>,
}

/// Configuration pushed to or retracted from the vpp-agent
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Config {
    /// VPP interfaces
    #[prost(message, repeated, tag = "1")]
    pub interfaces: Vec<Interface>,
}

impl Config {
    /// Whether there is nothing to push
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

/// Apply a configuration
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRequest {
    /// Configuration to apply
    #[prost(message, optional, tag = "1")]
    pub update: Option<Config>,
    /// Replace everything the agent holds with `update`
    #[prost(bool, tag = "2")]
    pub full_resync: bool,
}

/// Reply to [`UpdateRequest`]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateResponse {}

/// Retract a configuration
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteRequest {
    /// Configuration to retract
    #[prost(message, optional, tag = "1")]
    pub delete: Option<Config>,
}

/// Reply to [`DeleteRequest`]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteResponse {}
