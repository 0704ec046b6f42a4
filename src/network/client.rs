use std::collections::VecDeque;
use std::future::pending;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::common::{ChatMessage, OutgoingMessage};
use crate::config::AppConfig;
use crate::error::{ChatError, Result};

use super::stomp::{Command, Frame, FrameDecoder, HeartBeat, Incoming};
use super::transport::{BrokerStream, open_transport};

const CLOSE_GRACE: Duration = Duration::from_secs(2);
const INBOUND_CAPACITY: usize = 256;
/// Socket reads pause while this many messages wait for the session.
const MAX_PENDING: usize = 256;

pub fn room_topic(room_id: &str) -> String {
    format!("/topic/room/{room_id}")
}

pub fn room_send_destination(room_id: &str) -> String {
    format!("/app/sendMessage/{room_id}")
}

/// Parses a MESSAGE body, stamping the subscribed room when the payload omits it.
pub fn parse_room_message(body: &str, room_id: &str) -> Result<ChatMessage> {
    let mut message: ChatMessage = serde_json::from_str(body)?;
    if message.room_id.is_empty() {
        message.room_id = room_id.to_string();
    }
    Ok(message)
}

/// Sự kiện từ kết nối broker gửi lên session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Message(ChatMessage),
    /// The connection ended without being asked to.
    Closed(String),
}

#[derive(Debug)]
enum Outbound {
    Publish {
        frame: Frame,
        written: oneshot::Sender<Result<()>>,
    },
}

/// Live STOMP subscription to one room.
///
/// The socket is owned by a background task; dropping the handle cancels it.
#[derive(Debug)]
pub struct BrokerConnection {
    room_id: String,
    write_timeout: Duration,
    outbound: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BrokerConnection {
    /// Opens the transport, completes the STOMP handshake and subscribes to the room topic.
    pub async fn connect(
        config: &AppConfig,
        room_id: &str,
    ) -> Result<(Self, mpsc::Receiver<BrokerEvent>)> {
        let url = config.broker_endpoint()?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let mut stream = open_transport(&url, timeout).await?;
        let mut decoder = FrameDecoder::new();

        let client_beat = HeartBeat::new(config.heartbeat_ms, config.heartbeat_ms);
        let host = url.host_str().unwrap_or("localhost");
        let connected = handshake(&mut stream, &mut decoder, host, client_beat, timeout).await?;
        let server_beat = connected
            .get_header("heart-beat")
            .map(HeartBeat::parse)
            .transpose()?
            .unwrap_or_default();
        let (send_interval, read_interval) = HeartBeat::negotiate(client_beat, server_beat);
        log::info!(
            "STOMP session established (version {}, heart-beat {client_beat} / {server_beat})",
            connected.get_header("version").unwrap_or("1.0")
        );

        let subscription_id = format!("sub-{}", Uuid::new_v4());
        let topic = room_topic(room_id);
        stream
            .send(Message::text(Frame::subscribe(&subscription_id, &topic).encode()))
            .await?;
        log::info!("Subscribed to {topic} as {subscription_id}");

        let (event_tx, event_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let worker = ConnectionWorker {
            stream,
            decoder,
            room_id: room_id.to_string(),
            subscription_id,
            outbound: outbound_rx,
            events: event_tx,
            pending: VecDeque::new(),
            cancel: cancel.clone(),
            send_interval,
            // Chấp nhận trễ tối đa 3 chu kỳ heart-beat trước khi coi là mất kết nối
            read_window: read_interval.map(|interval| interval * 3),
        };
        let task = tokio::spawn(worker.run());

        Ok((
            Self {
                room_id: room_id.to_string(),
                write_timeout: timeout,
                outbound: outbound_tx,
                cancel,
                task: Some(task),
            },
            event_rx,
        ))
    }

    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Hands a message to the socket. Resolves once the frame is written, not delivered.
    pub async fn publish(&self, message: &OutgoingMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let frame = Frame::send(&room_send_destination(&self.room_id), json);
        let (written_tx, written_rx) = oneshot::channel();

        self.outbound
            .send(Outbound::Publish {
                frame,
                written: written_tx,
            })
            .await
            .map_err(|_| ChatError::NotConnected)?;

        match tokio::time::timeout(self.write_timeout, written_rx).await {
            Ok(written) => written.map_err(|_| ChatError::NotConnected)?,
            Err(_) => Err(ChatError::Timeout(format!(
                "writing to room {}",
                self.room_id
            ))),
        }
    }

    /// Unsubscribes, disconnects and waits briefly for the socket task to finish.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                log::warn!("Broker connection for room {} did not close in time", self.room_id);
            }
        }
    }
}

impl Drop for BrokerConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn handshake(
    stream: &mut BrokerStream,
    decoder: &mut FrameDecoder,
    host: &str,
    heart_beat: HeartBeat,
    timeout: Duration,
) -> Result<Frame> {
    stream
        .send(Message::text(Frame::connect(host, heart_beat).encode()))
        .await?;

    tokio::time::timeout(timeout, read_connected(stream, decoder))
        .await
        .map_err(|_| ChatError::Timeout("waiting for CONNECTED".into()))?
}

async fn read_connected(stream: &mut BrokerStream, decoder: &mut FrameDecoder) -> Result<Frame> {
    loop {
        while let Some(item) = decoder.next_item()? {
            let Incoming::Frame(frame) = item else {
                continue;
            };
            return match frame.command {
                Command::Connected => Ok(frame),
                Command::Error => Err(ChatError::Broker(error_text(&frame))),
                other => Err(ChatError::Protocol(format!(
                    "expected CONNECTED, got {}",
                    other.as_str()
                ))),
            };
        }

        match stream.next().await {
            Some(Ok(message)) => {
                if let Feed::Closed(reason) = feed(decoder, message) {
                    return Err(ChatError::Protocol(format!(
                        "connection closed during handshake: {reason}"
                    )));
                }
            }
            Some(Err(err)) => return Err(err.into()),
            None => {
                return Err(ChatError::Protocol(
                    "connection closed during handshake".into(),
                ));
            }
        }
    }
}

fn error_text(frame: &Frame) -> String {
    match frame.get_header("message") {
        Some(message) if frame.body.is_empty() => message.to_string(),
        Some(message) => format!("{message}: {}", frame.body.trim()),
        None => frame.body.trim().to_string(),
    }
}

enum Feed {
    Data,
    Closed(String),
}

fn feed(decoder: &mut FrameDecoder, message: Message) -> Feed {
    match message {
        Message::Text(text) => decoder.push(text.as_bytes()),
        Message::Binary(data) => decoder.push(&data),
        Message::Close(frame) => {
            let reason = frame
                .map(|frame| format!("{} {}", frame.code, frame.reason))
                .unwrap_or_else(|| "no close frame".to_string());
            return Feed::Closed(reason);
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
    }
    Feed::Data
}

enum Exit {
    Cancelled,
    Lost(String),
}

struct ConnectionWorker {
    stream: BrokerStream,
    decoder: FrameDecoder,
    room_id: String,
    subscription_id: String,
    outbound: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<BrokerEvent>,
    /// Parsed messages the session has not taken yet.
    pending: VecDeque<ChatMessage>,
    cancel: CancellationToken,
    send_interval: Option<Duration>,
    read_window: Option<Duration>,
}

impl ConnectionWorker {
    async fn run(mut self) {
        match self.event_loop().await {
            Exit::Cancelled => self.goodbye().await,
            Exit::Lost(reason) => {
                log::warn!("Broker connection for room {} lost: {reason}", self.room_id);
                // Queued publishes fail with NotConnected once their ack senders drop.
                self.outbound.close();
                while self.outbound.try_recv().is_ok() {}
                for message in std::mem::take(&mut self.pending) {
                    if self.events.send(BrokerEvent::Message(message)).await.is_err() {
                        return;
                    }
                }
                let _ = self.events.send(BrokerEvent::Closed(reason)).await;
            }
        }
    }

    async fn event_loop(&mut self) -> Exit {
        // Frames that arrived together with CONNECTED.
        if let Err(reason) = self.drain_decoder() {
            return Exit::Lost(reason);
        }

        let mut heartbeat = self
            .send_interval
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));
        let mut last_read = Instant::now();

        loop {
            let reading = self.pending.len() < MAX_PENDING;
            if !reading {
                // Paused reads must not count as broker silence.
                last_read = Instant::now();
            }
            let read_deadline = self.read_window.map(|window| last_read + window);
            let delivering = !self.pending.is_empty();
            let events = self.events.clone();

            tokio::select! {
                _ = self.cancel.cancelled() => return Exit::Cancelled,
                request = self.outbound.recv() => {
                    let Some(Outbound::Publish { frame, written }) = request else {
                        return Exit::Cancelled;
                    };
                    let result = self
                        .stream
                        .send(Message::text(frame.encode()))
                        .await
                        .map_err(ChatError::from);
                    let failure = result.as_ref().err().map(ToString::to_string);
                    let _ = written.send(result);
                    if let Some(reason) = failure {
                        return Exit::Lost(reason);
                    }
                }
                _ = tick(&mut heartbeat) => {
                    if let Err(err) = self.stream.send(Message::text("\n")).await {
                        return Exit::Lost(err.to_string());
                    }
                }
                _ = sleep_until(read_deadline), if reading => {
                    return Exit::Lost("broker heart-beat timed out".into());
                }
                permit = events.reserve(), if delivering => match permit {
                    Ok(permit) => {
                        if let Some(message) = self.pending.pop_front() {
                            permit.send(BrokerEvent::Message(message));
                        }
                    }
                    Err(_) => {
                        log::debug!("Session gone; dropping {} inbound messages", self.pending.len());
                        self.pending.clear();
                    }
                },
                incoming = self.stream.next(), if reading => {
                    last_read = Instant::now();
                    match incoming {
                        Some(Ok(message)) => {
                            if let Feed::Closed(reason) = feed(&mut self.decoder, message) {
                                return Exit::Lost(format!("closed by broker ({reason})"));
                            }
                            if let Err(reason) = self.drain_decoder() {
                                return Exit::Lost(reason);
                            }
                        }
                        Some(Err(err)) => return Exit::Lost(err.to_string()),
                        None => return Exit::Lost("connection closed by broker".into()),
                    }
                }
            }
        }
    }

    fn drain_decoder(&mut self) -> std::result::Result<(), String> {
        loop {
            let item = match self.decoder.next_item() {
                Ok(Some(item)) => item,
                Ok(None) => return Ok(()),
                Err(err) => return Err(err.to_string()),
            };
            let Incoming::Frame(frame) = item else {
                continue;
            };

            match frame.command {
                Command::Message => self.forward(frame),
                Command::Error => return Err(format!("broker error: {}", error_text(&frame))),
                Command::Receipt => {
                    log::debug!("Receipt {}", frame.get_header("receipt-id").unwrap_or("?"));
                }
                other => log::debug!("Ignoring {} frame", other.as_str()),
            }
        }
    }

    fn forward(&mut self, frame: Frame) {
        if frame
            .get_header("subscription")
            .is_some_and(|id| id != self.subscription_id)
        {
            log::debug!("Dropping MESSAGE for foreign subscription");
            return;
        }

        match parse_room_message(&frame.body, &self.room_id) {
            Ok(message) => self.pending.push_back(message),
            Err(err) => log::warn!("Discarding malformed chat payload: {err}"),
        }
    }

    async fn goodbye(&mut self) {
        let receipt = format!("disconnect-{}", Uuid::new_v4());
        let frames = [
            Frame::unsubscribe(&self.subscription_id),
            Frame::disconnect(&receipt),
        ];
        for frame in frames {
            if self.stream.send(Message::text(frame.encode())).await.is_err() {
                break;
            }
        }
        if let Err(err) = self.stream.close(None).await {
            log::debug!("Closing broker socket: {err}");
        }
        log::info!("Disconnected from room {}", self.room_id);
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}
