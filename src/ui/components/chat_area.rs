use chrono::Utc;
use eframe::egui;

use crate::common::time_ago;
use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &AppState) {
    if state.messages.is_empty() {
        ui.centered_and_justified(|ui| {
            ui.label(egui::RichText::new("No messages yet. Say hello!").weak());
        });
        return;
    }

    let now = Utc::now();
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for message in &state.messages {
                let mine = state.is_mine(message);
                let align = if mine { egui::Align::Max } else { egui::Align::Min };

                ui.with_layout(egui::Layout::top_down(align), |ui| {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        if !mine {
                            ui.label(egui::RichText::new(&message.sender).strong());
                        }
                        ui.label(&message.content);
                        let when = time_ago(message.timestamp, now);
                        if !when.is_empty() {
                            ui.label(egui::RichText::new(when).weak().small());
                        }
                    });
                });
                ui.add_space(4.0);
            }
        });
}
