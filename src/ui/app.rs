use std::time::Instant;

use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{SessionCommand, SessionEvent};

use super::components::{
    chat_area, header, input_bar,
    join_form::{self, EntryAction},
    toasts,
};
use super::state::{AppState, Screen};

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<SessionCommand>,
    event_receiver: mpsc::Receiver<SessionEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<SessionCommand>,
        event_receiver: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            state: AppState::new(),
            command_sender,
            event_receiver,
        }
    }

    fn handle_session_events(&mut self) {
        let now = Instant::now();
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply(event, now);
        }
        self.state.prune_toasts(now);
    }

    fn send_command(&mut self, command: SessionCommand) -> bool {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to session: {err}");
            return false;
        }
        true
    }

    fn enter_room(&mut self, action: EntryAction) {
        let Some((room_id, user_name)) = self.state.begin_entry(Instant::now()) else {
            return;
        };
        let command = match action {
            EntryAction::Join => SessionCommand::JoinRoom { room_id, user_name },
            EntryAction::Create => SessionCommand::CreateRoom { room_id, user_name },
        };
        if !self.send_command(command) {
            self.state.is_loading = false;
        }
    }

    fn send_message(&mut self) {
        let Some(text) = self.state.begin_send() else {
            return;
        };
        if !self.send_command(SessionCommand::SendMessage(text)) {
            self.state.is_sending = false;
        }
    }

    fn leave_room(&mut self) {
        self.send_command(SessionCommand::LeaveRoom);
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_session_events();

        match self.state.screen {
            Screen::JoinCreate => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    if let Some(action) = join_form::render(ui, &mut self.state) {
                        self.enter_room(action);
                    }
                });
            }
            Screen::Room => {
                egui::TopBottomPanel::top("room_header").show(ctx, |ui| {
                    if header::render(ui, &self.state) {
                        self.leave_room();
                    }
                });

                egui::TopBottomPanel::bottom("input_bar").show(ctx, |ui| {
                    let can_send = self.state.can_send();
                    let is_sending = self.state.is_sending;
                    if input_bar::render(ui, &mut self.state.input_text, can_send, is_sending) {
                        self.send_message();
                    }
                });

                egui::CentralPanel::default().show(ctx, |ui| {
                    chat_area::render(ui, &self.state);
                });
            }
        }

        toasts::render(ctx, &self.state.toasts);
        ctx.request_repaint();
    }
}
