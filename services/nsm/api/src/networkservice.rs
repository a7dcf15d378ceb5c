//! Network service request message.

use crate::connection::{Connection, Mechanism};

/// Desired connection parameters sent down a handler chain
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NetworkServiceRequest {
    /// Previous connection, or the requested id and service for a new one
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    /// Mechanisms the client is able to use, in preference order
    #[prost(message, repeated, tag = "2")]
    pub mechanism_preferences: Vec<Mechanism>,
}

impl NetworkServiceRequest {
    /// Request for the given connection
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Some(connection),
            mechanism_preferences: Vec::new(),
        }
    }

    /// Id of the carried connection, empty when there is none
    pub fn connection_id(&self) -> &str {
        self.connection.as_ref().map(|c| c.id.as_str()).unwrap_or_default()
    }

    /// Clone of this request carrying `connection` instead
    pub fn with_connection(&self, connection: Connection) -> Self {
        let mut request = self.clone();
        request.connection = Some(connection);
        request
    }
}
