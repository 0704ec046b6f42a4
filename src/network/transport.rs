use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{ChatError, Result};

pub type BrokerStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the WebSocket that carries STOMP frames to the broker.
pub async fn open_transport(url: &Url, timeout: Duration) -> Result<BrokerStream> {
    log::info!("Opening broker transport to {url}");
    let (stream, response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| ChatError::Timeout(format!("connecting to {url}")))??;

    log::debug!("WebSocket handshake completed with status {}", response.status());
    Ok(stream)
}
