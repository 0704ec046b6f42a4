use crate::network::BrokerConnection;

/// Disconnected → Connecting → Connected → Disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// One visit to a room: who is in which room, and the live connection if any.
#[derive(Debug)]
pub struct SessionState {
    pub room_id: String,
    pub current_user: String,
    pub connection_state: ConnectionState,
    pub(crate) connection: Option<BrokerConnection>,
}

impl SessionState {
    pub fn new(room_id: impl Into<String>, current_user: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            current_user: current_user.into(),
            connection_state: ConnectionState::Disconnected,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
            && self.connection.as_ref().is_some_and(BrokerConnection::is_open)
    }

    pub fn has_transport(&self) -> bool {
        self.connection.is_some()
    }

    /// Drops the transport handle, which cancels its socket task.
    pub(crate) fn mark_disconnected(&mut self) {
        self.connection = None;
        self.connection_state = ConnectionState::Disconnected;
    }
}
