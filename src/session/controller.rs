use std::future::pending;

use tokio::sync::mpsc;

use crate::common::{ChatMessage, Notice, OutgoingMessage, SessionCommand, SessionEvent};
use crate::config::AppConfig;
use crate::error::{ChatError, Result};
use crate::network::{BrokerConnection, BrokerEvent, RoomService};

use super::state::{ConnectionState, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Join,
    Create,
}

impl Entry {
    fn success_text(self) -> &'static str {
        match self {
            Entry::Join => "Joined successfully!",
            Entry::Create => "Room Created Successfully!",
        }
    }

    fn failure_text(self, err: &ChatError) -> String {
        match (self, err) {
            (Entry::Create, ChatError::Api { status: 400, .. }) => "Room already exists!".into(),
            (Entry::Create, _) => "Error in creating room".into(),
            (Entry::Join, ChatError::Api { status: 400, body }) if !body.trim().is_empty() => {
                body.trim().to_string()
            }
            (Entry::Join, _) => "Error in joining room".into(),
        }
    }
}

/// Owns a single room visit: REST join/create, history, the broker
/// subscription and the ordered transcript.
///
/// Everything runs on one task; the UI only talks to it through
/// [`SessionCommand`]s and [`SessionEvent`]s.
pub struct SessionController {
    config: AppConfig,
    rooms: RoomService,
    events: mpsc::Sender<SessionEvent>,
    session: Option<SessionState>,
    transcript: Vec<ChatMessage>,
    inbound: Option<mpsc::Receiver<BrokerEvent>>,
    sending: bool,
}

impl SessionController {
    pub fn new(config: AppConfig, events: mpsc::Sender<SessionEvent>) -> Result<Self> {
        let rooms = RoomService::new(&config)?;
        Ok(Self {
            config,
            rooms,
            events,
            session: None,
            transcript: Vec::new(),
            inbound: None,
            sending: false,
        })
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map_or(ConnectionState::Disconnected, |session| session.connection_state)
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub async fn join_room(&mut self, room_id: &str, user_name: &str) -> Result<()> {
        self.enter(Entry::Join, room_id, user_name).await
    }

    pub async fn create_room(&mut self, room_id: &str, user_name: &str) -> Result<()> {
        self.enter(Entry::Create, room_id, user_name).await
    }

    async fn enter(&mut self, entry: Entry, room_id: &str, user_name: &str) -> Result<()> {
        let (room_id, user_name) = (room_id.trim(), user_name.trim());
        if room_id.is_empty() || user_name.is_empty() {
            self.notify(Notice::error("Invalid Input !!")).await;
            self.emit(SessionEvent::RequestFailed).await;
            return Err(ChatError::Validation(
                "room id and user name are required".into(),
            ));
        }

        if let Some(previous) = self.session.as_ref().map(|session| session.room_id.clone()) {
            log::info!("Leaving room {previous} before entering {room_id}");
            self.teardown().await;
            self.notify(Notice::info(format!("Left room {previous}"))).await;
        }

        let result = match entry {
            Entry::Join => self.rooms.join_room(room_id).await,
            Entry::Create => self.rooms.create_room(room_id).await,
        };
        let room = match result {
            Ok(room) => room,
            Err(err) => {
                log::warn!("{entry:?} room {room_id} failed: {err}");
                self.notify(Notice::error(entry.failure_text(&err))).await;
                self.emit(SessionEvent::RequestFailed).await;
                return Err(err);
            }
        };

        let room_id = if room.room_id.is_empty() {
            room_id.to_string()
        } else {
            room.room_id
        };
        log::info!("{user_name} entered room {room_id}");
        self.notify(Notice::success(entry.success_text())).await;
        self.session = Some(SessionState::new(room_id.clone(), user_name));
        self.emit(SessionEvent::RoomEntered {
            room_id,
            user_name: user_name.to_string(),
        })
        .await;

        self.load_history().await;
        if let Err(err) = self.connect().await {
            log::warn!("Room entered without a live connection: {err}");
        }
        Ok(())
    }

    /// Replaces the transcript with the room's stored history.
    ///
    /// A failed fetch leaves an empty transcript.
    pub async fn load_history(&mut self) {
        let Some(room_id) = self.session.as_ref().map(|session| session.room_id.clone()) else {
            return;
        };

        match self
            .rooms
            .fetch_messages(&room_id, self.config.history_page_size, 0)
            .await
        {
            Ok(messages) => {
                log::info!("Loaded {} messages for room {room_id}", messages.len());
                self.transcript = messages;
            }
            Err(err) => {
                log::error!("Error loading messages for room {room_id}: {err}");
                self.transcript.clear();
                self.notify(Notice::error("Could not load message history"))
                    .await;
            }
        }
        self.emit(SessionEvent::HistoryLoaded(self.transcript.clone()))
            .await;
    }

    /// Opens the broker subscription for the current room.
    ///
    /// No-op when a connection already exists.
    pub async fn connect(&mut self) -> Result<()> {
        let room_id = match self.session.as_mut() {
            None => return Err(ChatError::NotConnected),
            Some(session) if session.has_transport() => return Ok(()),
            Some(session) => {
                session.connection_state = ConnectionState::Connecting;
                session.room_id.clone()
            }
        };

        let outcome = BrokerConnection::connect(&self.config, &room_id).await;
        let Some(session) = self.session.as_mut() else {
            return Err(ChatError::NotConnected);
        };
        match outcome {
            Ok((connection, inbound)) => {
                session.connection = Some(connection);
                session.connection_state = ConnectionState::Connected;
                self.inbound = Some(inbound);
                self.notify(Notice::success("Connected to Nexus!")).await;
                self.emit(SessionEvent::Connected).await;
                Ok(())
            }
            Err(err) => {
                session.mark_disconnected();
                log::error!("Could not connect to room {room_id}: {err}");
                self.notify(Notice::error("Could not connect to the chat server"))
                    .await;
                Err(err)
            }
        }
    }

    /// Publishes `text` to the current room.
    ///
    /// Returns `Ok(false)` without doing anything when the text is blank,
    /// there is no open transport, or another send is in flight.
    pub async fn send(&mut self, text: &str) -> Result<bool> {
        if text.trim().is_empty() || self.sending {
            return Ok(false);
        }
        let Some(session) = self.session.as_ref().filter(|session| session.is_connected()) else {
            return Ok(false);
        };
        let Some(connection) = session.connection.as_ref() else {
            return Ok(false);
        };

        let outgoing = OutgoingMessage {
            sender: session.current_user.clone(),
            content: text.to_string(),
            room_id: session.room_id.clone(),
        };
        self.sending = true;
        let result = connection.publish(&outgoing).await;
        self.sending = false;

        match result {
            Ok(()) => {
                log::debug!("Published message to room {}", outgoing.room_id);
                self.emit(SessionEvent::MessageSent).await;
                Ok(true)
            }
            Err(err) => {
                log::error!("Error sending message: {err}");
                self.notify(Notice::error("Failed to send message!")).await;
                self.emit(SessionEvent::SendFailed).await;
                Err(err)
            }
        }
    }

    /// Ends the visit. Always leaves the controller disconnected with no transport.
    pub async fn leave(&mut self) {
        self.teardown().await;
        self.notify(Notice::success("Left the room")).await;
        self.emit(SessionEvent::Left).await;
    }

    async fn teardown(&mut self) {
        self.inbound = None;
        self.transcript.clear();
        self.sending = false;
        if let Some(mut session) = self.session.take() {
            session.connection_state = ConnectionState::Disconnected;
            if let Some(connection) = session.connection.take() {
                connection.close().await;
            }
        }
    }

    /// Waits for the next event from the broker connection.
    ///
    /// Pends forever while there is no connection.
    pub async fn next_inbound(&mut self) -> BrokerEvent {
        let Some(inbound) = self.inbound.as_mut() else {
            return pending().await;
        };
        match inbound.recv().await {
            Some(event) => event,
            None => {
                self.inbound = None;
                BrokerEvent::Closed("broker connection ended".into())
            }
        }
    }

    pub async fn handle_inbound(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Message(message) => {
                self.transcript.push(message.clone());
                self.emit(SessionEvent::MessageReceived(message)).await;
            }
            BrokerEvent::Closed(reason) => {
                self.inbound = None;
                if let Some(session) = self.session.as_mut() {
                    session.mark_disconnected();
                }
                // Không tự động kết nối lại; người dùng phải vào lại phòng.
                log::warn!("Connection lost: {reason}");
                self.notify(Notice::error("Connection lost. Rejoin the room to reconnect."))
                    .await;
                self.emit(SessionEvent::ConnectionLost(reason)).await;
            }
        }
    }

    pub async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::JoinRoom { room_id, user_name } => {
                if let Err(err) = self.join_room(&room_id, &user_name).await {
                    log::debug!("Join request ended with {err}");
                }
            }
            SessionCommand::CreateRoom { room_id, user_name } => {
                if let Err(err) = self.create_room(&room_id, &user_name).await {
                    log::debug!("Create request ended with {err}");
                }
            }
            SessionCommand::SendMessage(text) => match self.send(&text).await {
                Ok(true) | Err(_) => {}
                Ok(false) => self.emit(SessionEvent::SendFailed).await,
            },
            SessionCommand::LeaveRoom => self.leave().await,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        log::info!("Session controller started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = self.next_inbound() => self.handle_inbound(event).await,
            }
        }
        self.teardown().await;
        log::info!("Session controller stopped");
    }

    async fn notify(&self, notice: Notice) {
        self.emit(SessionEvent::Notify(notice)).await;
    }

    async fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.events.send(event).await {
            log::debug!("UI is gone; dropping {:?}", err.0);
        }
    }
}
