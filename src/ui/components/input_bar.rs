use eframe::egui;

/// Message box plus send button. Returns true when the user asked to send.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, can_send: bool, is_sending: bool) -> bool {
    let mut send = false;
    ui.horizontal(|ui| {
        let response = ui.add(
            egui::TextEdit::singleline(input_text)
                .hint_text("Type your message...")
                .desired_width(ui.available_width() - 80.0),
        );
        let label = if is_sending { "Sending..." } else { "Send" };
        if ui.add_enabled(can_send, egui::Button::new(label)).clicked() {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
            response.request_focus();
        }
    });

    send
}
