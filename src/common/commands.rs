/// Lệnh UI gửi xuống session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Join an existing room as `user_name`.
    JoinRoom { room_id: String, user_name: String },
    /// Create a room on the backend, then join it as `user_name`.
    CreateRoom { room_id: String, user_name: String },
    /// Publish the raw input text to the current room.
    SendMessage(String),
    LeaveRoom,
}
