use super::types::{ChatMessage, Notice};

/// Sự kiện từ session controller gửi lên UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A join/create succeeded; the UI switches to the room screen.
    RoomEntered { room_id: String, user_name: String },
    /// A join/create request finished without entering a room.
    RequestFailed,
    HistoryLoaded(Vec<ChatMessage>),
    Connected,
    /// The live connection went away; no reconnect is attempted.
    ConnectionLost(String),
    MessageReceived(ChatMessage),
    MessageSent,
    SendFailed,
    Left,
    Notify(Notice),
}
