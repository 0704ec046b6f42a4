use eframe::egui;

use crate::common::NoticeLevel;
use crate::ui::state::Toast;

pub fn render(ctx: &egui::Context, toasts: &[Toast]) {
    if toasts.is_empty() {
        return;
    }

    egui::Area::new(egui::Id::new("toasts"))
        .anchor(egui::Align2::CENTER_TOP, [0.0, 12.0])
        .show(ctx, |ui| {
            for toast in toasts {
                let color = match toast.notice.level {
                    NoticeLevel::Success => egui::Color32::GREEN,
                    NoticeLevel::Info => egui::Color32::LIGHT_BLUE,
                    NoticeLevel::Error => egui::Color32::RED,
                };
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.colored_label(color, &toast.notice.text);
                });
            }
        });
}
