use eframe::egui;

use crate::ui::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    Join,
    Create,
}

pub fn render(ui: &mut egui::Ui, state: &mut AppState) -> Option<EntryAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        ui.add_space(40.0);
        ui.heading("Join or create a room");
        ui.add_space(16.0);

        ui.label("Room ID");
        ui.add(egui::TextEdit::singleline(&mut state.room_input).hint_text("Enter the room id"));
        ui.add_space(8.0);

        ui.label("Your name");
        let name = ui.add(egui::TextEdit::singleline(&mut state.user_input).hint_text("Enter your name"));
        ui.add_space(16.0);

        let enabled = !state.is_loading;
        ui.horizontal(|ui| {
            if ui.add_enabled(enabled, egui::Button::new("Join Room")).clicked() {
                action = Some(EntryAction::Join);
            }
            if ui.add_enabled(enabled, egui::Button::new("Create Room")).clicked() {
                action = Some(EntryAction::Create);
            }
        });

        if name.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) && enabled {
            action = Some(EntryAction::Join);
        }

        if state.is_loading {
            ui.add_space(8.0);
            ui.spinner();
        }
    });

    action
}
