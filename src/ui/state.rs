use std::time::{Duration, Instant};

use crate::common::{ChatMessage, Notice, NoticeLevel, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    JoinCreate,
    Room,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub notice: Notice,
    pub shown_at: Instant,
}

impl Toast {
    fn lifetime(&self) -> Duration {
        match self.notice.level {
            NoticeLevel::Error => Duration::from_secs(4),
            NoticeLevel::Success | NoticeLevel::Info => Duration::from_secs(2),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.lifetime()
    }
}

/// Trạng thái cục bộ của UI.
///
/// Mirrors what the session controller reports; never mutated by the network directly.
pub struct AppState {
    pub screen: Screen,
    pub room_input: String,
    pub user_input: String,
    pub is_loading: bool,
    pub room_id: String,
    pub current_user: String,
    pub connected: bool,
    pub messages: Vec<ChatMessage>,
    pub input_text: String,
    pub is_sending: bool,
    pub toasts: Vec<Toast>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::JoinCreate,
            room_input: String::new(),
            user_input: String::new(),
            is_loading: false,
            room_id: String::new(),
            current_user: String::new(),
            connected: false,
            messages: Vec::new(),
            input_text: String::new(),
            is_sending: false,
            toasts: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::RoomEntered { room_id, user_name } => {
                self.screen = Screen::Room;
                self.room_id = room_id;
                self.current_user = user_name;
                self.is_loading = false;
                self.connected = false;
                self.messages.clear();
                self.input_text.clear();
                self.is_sending = false;
            }
            SessionEvent::RequestFailed => self.is_loading = false,
            SessionEvent::HistoryLoaded(history) => self.messages = history,
            SessionEvent::Connected => self.connected = true,
            SessionEvent::ConnectionLost(_) => {
                self.connected = false;
                self.is_sending = false;
            }
            SessionEvent::MessageReceived(message) => self.messages.push(message),
            SessionEvent::MessageSent => {
                self.input_text.clear();
                self.is_sending = false;
            }
            SessionEvent::SendFailed => self.is_sending = false,
            SessionEvent::Left => {
                self.screen = Screen::JoinCreate;
                self.room_id.clear();
                self.current_user.clear();
                self.connected = false;
                self.messages.clear();
                self.input_text.clear();
                self.is_sending = false;
                self.room_input.clear();
                self.user_input.clear();
            }
            SessionEvent::Notify(notice) => self.push_notice(notice, now),
        }
    }

    /// Validates the join/create form, marking the request as loading on success.
    pub fn begin_entry(&mut self, now: Instant) -> Option<(String, String)> {
        if self.is_loading {
            return None;
        }
        let room_id = self.room_input.trim();
        let user_name = self.user_input.trim();
        if room_id.is_empty() || user_name.is_empty() {
            self.push_notice(Notice::error("Invalid Input !!"), now);
            return None;
        }

        let entry = (room_id.to_string(), user_name.to_string());
        self.is_loading = true;
        Some(entry)
    }

    pub fn can_send(&self) -> bool {
        self.connected && !self.is_sending && !self.input_text.trim().is_empty()
    }

    /// Takes the input for sending; it is cleared once the controller confirms.
    pub fn begin_send(&mut self) -> Option<String> {
        if !self.can_send() {
            return None;
        }
        self.is_sending = true;
        Some(self.input_text.clone())
    }

    pub fn is_mine(&self, message: &ChatMessage) -> bool {
        message.is_from(&self.current_user)
    }

    pub fn push_notice(&mut self, notice: Notice, now: Instant) {
        self.toasts.push(Toast {
            notice,
            shown_at: now,
        });
    }

    pub fn prune_toasts(&mut self, now: Instant) {
        self.toasts.retain(|toast| !toast.is_expired(now));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
