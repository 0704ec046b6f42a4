pub mod commands;
pub mod events;
pub mod time;
pub mod types;

pub use commands::SessionCommand;
pub use events::SessionEvent;
pub use time::time_ago;
pub use types::{ChatMessage, Notice, NoticeLevel, OutgoingMessage, Room};
