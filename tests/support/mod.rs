//! In-process stand-ins for the chat backend: wiremock for REST and a tiny
//! STOMP broker on a local WebSocket.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use nexus_chat::common::SessionEvent;
use nexus_chat::config::AppConfig;
use nexus_chat::network::stomp::{Command, Frame, FrameDecoder, Incoming};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum Control {
    Deliver {
        destination: String,
        bodies: Vec<String>,
    },
    Error(String),
    Kill,
}

#[derive(Debug, Clone, Copy)]
struct Behaviour {
    refuse: bool,
    /// `heart-beat` header of the CONNECTED reply. The broker never sends beats itself.
    heart_beat: &'static str,
}

#[derive(Debug, Default)]
struct Seen {
    frames: Mutex<Vec<Frame>>,
    heartbeats: AtomicUsize,
}

pub struct MockBroker {
    pub url: String,
    seen: Arc<Seen>,
    control: broadcast::Sender<Control>,
}

impl MockBroker {
    pub async fn start() -> Self {
        Self::start_with(Behaviour {
            refuse: false,
            heart_beat: "0,0",
        })
        .await
    }

    /// Answers every CONNECT with an ERROR frame.
    pub async fn refusing() -> Self {
        Self::start_with(Behaviour {
            refuse: true,
            heart_beat: "0,0",
        })
        .await
    }

    /// Advertises `heart_beat` in CONNECTED.
    pub async fn with_heart_beat(heart_beat: &'static str) -> Self {
        Self::start_with(Behaviour {
            refuse: false,
            heart_beat,
        })
        .await
    }

    async fn start_with(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Seen::default());
        let (control, _) = broadcast::channel(64);

        let accept_seen = Arc::clone(&seen);
        let accept_control = control.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(
                    socket,
                    behaviour,
                    Arc::clone(&accept_seen),
                    accept_control.subscribe(),
                ));
            }
        });

        Self {
            url: format!("ws://{addr}/chat/websocket"),
            seen,
            control,
        }
    }

    pub fn deliver(&self, destination: &str, body: Value) {
        self.deliver_all(destination, vec![body]);
    }

    /// Pushes every body to subscribers of `destination`, in order.
    pub fn deliver_all(&self, destination: &str, bodies: Vec<Value>) {
        let _ = self.control.send(Control::Deliver {
            destination: destination.to_string(),
            bodies: bodies.iter().map(Value::to_string).collect(),
        });
    }

    /// Sends an ERROR frame on every connection and keeps the socket open.
    pub fn send_error(&self, message: &str) {
        let _ = self.control.send(Control::Error(message.to_string()));
    }

    /// Bare-EOL heart-beats received from clients so far.
    pub fn heartbeats(&self) -> usize {
        self.seen.heartbeats.load(Ordering::SeqCst)
    }

    pub fn kill_connections(&self) {
        let _ = self.control.send(Control::Kill);
    }

    pub fn frames(&self, command: Command) -> Vec<Frame> {
        self.seen
            .frames
            .lock()
            .unwrap()
            .iter()
            .filter(|frame| frame.command == command)
            .cloned()
            .collect()
    }

    /// Waits until the broker has seen at least `count` frames of `command`.
    pub async fn wait_for(&self, command: Command, count: usize) -> Vec<Frame> {
        tokio::time::timeout(WAIT, async {
            loop {
                let frames = self.frames(command);
                if frames.len() >= count {
                    return frames;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("broker never saw {count} {} frame(s)", command.as_str()))
    }
}

async fn serve(
    socket: TcpStream,
    behaviour: Behaviour,
    seen: Arc<Seen>,
    mut control: broadcast::Receiver<Control>,
) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
        return;
    };
    let mut decoder = FrameDecoder::new();
    let mut subscriptions: Vec<(String, String)> = Vec::new();
    let mut counter = 0u64;

    loop {
        tokio::select! {
            ctl = control.recv() => match ctl {
                Ok(Control::Deliver { destination, bodies }) => {
                    for body in &bodies {
                        if !deliver(&mut ws, &subscriptions, &destination, body, &mut counter).await {
                            return;
                        }
                    }
                }
                Ok(Control::Error(message)) => {
                    let frame = Frame::new(Command::Error).header("message", message);
                    if ws.send(Message::text(frame.encode())).await.is_err() {
                        return;
                    }
                }
                Ok(Control::Kill) | Err(broadcast::error::RecvError::Closed) => {
                    let _ = ws.close(None).await;
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            },
            incoming = ws.next() => {
                let Some(Ok(message)) = incoming else {
                    return;
                };
                match message {
                    Message::Text(text) => decoder.push(text.as_bytes()),
                    Message::Close(_) => return,
                    _ => continue,
                }

                while let Ok(Some(item)) = decoder.next_item() {
                    let Incoming::Frame(frame) = item else {
                        seen.heartbeats.fetch_add(1, Ordering::SeqCst);
                        continue;
                    };
                    seen.frames.lock().unwrap().push(frame.clone());

                    match frame.command {
                        Command::Connect => {
                            let reply = if behaviour.refuse {
                                Frame::new(Command::Error).header("message", "Access refused")
                            } else {
                                Frame::new(Command::Connected)
                                    .header("version", "1.2")
                                    .header("heart-beat", behaviour.heart_beat)
                            };
                            if ws.send(Message::text(reply.encode())).await.is_err() || behaviour.refuse {
                                return;
                            }
                        }
                        Command::Subscribe => {
                            let id = frame.get_header("id").unwrap_or_default().to_string();
                            let destination =
                                frame.get_header("destination").unwrap_or_default().to_string();
                            subscriptions.push((id, destination));
                        }
                        Command::Unsubscribe => {
                            let id = frame.get_header("id").unwrap_or_default();
                            subscriptions.retain(|(sub_id, _)| sub_id.as_str() != id);
                        }
                        Command::Send => {
                            let destination = frame.get_header("destination").unwrap_or_default();
                            let Some(room) = destination.strip_prefix("/app/sendMessage/") else {
                                continue;
                            };
                            let mut stored: Value = serde_json::from_str(&frame.body).unwrap();
                            stored["timeStamp"] = json!(chrono::Utc::now()
                                .naive_utc()
                                .format("%Y-%m-%dT%H:%M:%S%.3f")
                                .to_string());
                            let topic = format!("/topic/room/{room}");
                            if !deliver(&mut ws, &subscriptions, &topic, &stored.to_string(), &mut counter).await {
                                return;
                            }
                        }
                        Command::Disconnect => {
                            if let Some(receipt) = frame.get_header("receipt") {
                                let reply = Frame::new(Command::Receipt).header("receipt-id", receipt);
                                let _ = ws.send(Message::text(reply.encode())).await;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

async fn deliver(
    ws: &mut WebSocketStream<TcpStream>,
    subscriptions: &[(String, String)],
    destination: &str,
    body: &str,
    counter: &mut u64,
) -> bool {
    for (id, _) in subscriptions.iter().filter(|(_, dest)| dest.as_str() == destination) {
        *counter += 1;
        let frame = Frame::new(Command::Message)
            .header("destination", destination)
            .header("subscription", id.as_str())
            .header("message-id", counter.to_string())
            .header("content-type", "application/json")
            .body(body);
        if ws.send(Message::text(frame.encode())).await.is_err() {
            return false;
        }
    }
    true
}

/// REST backend that knows `room_id` and serves `history` for it.
pub async fn backend_with_room(room_id: &str, history: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/rooms/{room_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "66f0c0ffee",
            "roomId": room_id,
            "messages": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/rooms/{room_id}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(history))
        .mount(&server)
        .await;
    server
}

pub fn config_for(backend: &MockServer, broker: &MockBroker) -> AppConfig {
    AppConfig {
        api_base_url: backend.uri(),
        broker_url: Some(broker.url.clone()),
        connect_timeout_secs: 3,
        ..AppConfig::default()
    }
}

pub fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub async fn next_event(events: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("no session event in time")
        .expect("session event channel closed")
}

/// Skips events until one matches `predicate`, returning it.
pub async fn wait_event(
    events: &mut mpsc::Receiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}
