use std::error::Error;

use clap::Parser;
use dotenvy::dotenv;
use nexus_chat::config::{self, AppConfig};
use nexus_chat::session::SessionController;
use nexus_chat::ui::ChatApp;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "nexus_chat", version, about = "Desktop client for Nexus chat rooms")]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Backend origin for REST calls (overrides config and NEXUS_API_URL)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
    /// STOMP WebSocket endpoint (overrides config and NEXUS_BROKER_URL)
    #[arg(long, value_name = "URL")]
    broker_url: Option<String>,
}

impl Cli {
    fn resolve_config(&self) -> AppConfig {
        let mut config = config::load_config(&self.config).with_env_overrides();
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.broker_url {
            config.broker_url = Some(url.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = cli.resolve_config();
    log::info!(
        "Using backend {} (broker {})",
        app_config.api_base_url,
        app_config
            .broker_endpoint()
            .map(|url| url.to_string())
            .unwrap_or_else(|err| err.to_string())
    );

    // 1. Tạo các kênh giao tiếp (Channels)
    // UI -> Session
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Session -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy Session Controller (Chạy ngầm)
    let controller = SessionController::new(app_config, event_tx)?;
    tokio::spawn(controller.run(cmd_rx));

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);

    eframe::run_native(
        "Nexus Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            Ok(Box::new(ChatApp::new(cc, cmd_tx.clone(), event_receiver)))
        }),
    )?;
    Ok(())
}
