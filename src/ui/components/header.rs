use eframe::egui;

use crate::ui::state::AppState;

/// Room title, connection indicator and the leave button. Returns true on leave.
pub fn render(ui: &mut egui::Ui, state: &AppState) -> bool {
    let mut leave = false;
    ui.horizontal(|ui| {
        ui.heading(format!("Room: {}", state.room_id));
        ui.separator();

        let (color, status) = if state.connected {
            (egui::Color32::GREEN, "Connected")
        } else {
            (egui::Color32::RED, "Disconnected")
        };
        ui.colored_label(color, "●");
        ui.label(format!("{status} as {}", state.current_user));

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Leave Room").clicked() {
                leave = true;
            }
        });
    });
    leave
}
