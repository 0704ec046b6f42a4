//! STOMP 1.2 frames as carried in WebSocket text messages.
//!
//! Only the subset a chat client needs: CONNECT/SUBSCRIBE/SEND/UNSUBSCRIBE/
//! DISCONNECT going out, CONNECTED/MESSAGE/RECEIPT/ERROR coming back.

use std::fmt::Write as _;
use std::time::Duration;

use crate::error::{ChatError, Result};

/// Largest frame the decoder will buffer, headers and body included.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let command = match raw {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        };
        Some(command)
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name`; repeated headers keep the earliest one.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn connect(host: &str, heart_beat: HeartBeat) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2,1.1,1.0")
            .header("host", host)
            .header("heart-beat", heart_beat.to_string())
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn send(destination: &str, json: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .body(json)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                let _ = writeln!(out, "{}:{}", escape_header(name), escape_header(value));
            } else {
                let _ = writeln!(out, "{name}:{value}");
            }
        }
        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            let _ = writeln!(out, "content-length:{}", self.body.len());
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// One item pulled off the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Heartbeat,
    Frame(Frame),
}

/// Incremental decoder; frames may be split across WebSocket messages.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Next complete item, `Ok(None)` when more data is needed.
    ///
    /// A protocol error discards the buffered bytes.
    pub fn next_item(&mut self) -> Result<Option<Incoming>> {
        match self.buffer.as_slice() {
            [] | [b'\r'] => return Ok(None),
            [b'\n', ..] => {
                self.buffer.drain(..1);
                return Ok(Some(Incoming::Heartbeat));
            }
            [b'\r', b'\n', ..] => {
                self.buffer.drain(..2);
                return Ok(Some(Incoming::Heartbeat));
            }
            _ => {}
        }

        match self.parse_frame() {
            Ok(Some((frame, consumed))) => {
                self.buffer.drain(..consumed);
                Ok(Some(Incoming::Frame(frame)))
            }
            Ok(None) if self.buffer.len() > MAX_FRAME_BYTES => {
                let buffered = self.buffer.len();
                self.buffer.clear();
                Err(ChatError::Protocol(format!(
                    "incomplete frame exceeds {MAX_FRAME_BYTES} bytes ({buffered} buffered)"
                )))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.buffer.clear();
                Err(err)
            }
        }
    }

    fn parse_frame(&self) -> Result<Option<(Frame, usize)>> {
        let buf = &self.buffer;
        let mut lines = Vec::new();
        let mut start = 0;
        let body_start = loop {
            let Some(offset) = buf[start..].iter().position(|byte| *byte == b'\n') else {
                return Ok(None);
            };
            let end = start + offset;
            let line = strip_cr(&buf[start..end]);
            if line.is_empty() {
                break end + 1;
            }
            lines.push(line);
            start = end + 1;
        };

        let Some((command_line, header_lines)) = lines.split_first() else {
            return Err(ChatError::Protocol("frame without command".into()));
        };
        let command_text = utf8(command_line)?;
        let command = Command::parse(command_text)
            .ok_or_else(|| ChatError::Protocol(format!("unknown command `{command_text}`")))?;

        let mut frame = Frame::new(command);
        for line in header_lines {
            let line = utf8(line)?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ChatError::Protocol(format!("malformed header `{line}`")))?;
            if command.escapes_headers() {
                frame
                    .headers
                    .push((unescape_header(name)?, unescape_header(value)?));
            } else {
                frame.headers.push((name.to_string(), value.to_string()));
            }
        }

        let body_end = match frame.get_header("content-length") {
            Some(raw) => {
                let length: usize = raw.trim().parse().map_err(|_| {
                    ChatError::Protocol(format!("invalid content-length `{raw}`"))
                })?;
                let end = body_start
                    .checked_add(length)
                    .filter(|end| *end <= MAX_FRAME_BYTES)
                    .ok_or_else(|| {
                        ChatError::Protocol(format!("content-length {length} exceeds frame limit"))
                    })?;
                match buf.get(end) {
                    None => return Ok(None),
                    Some(0) => end,
                    Some(_) => {
                        return Err(ChatError::Protocol(
                            "frame body not terminated by NUL".into(),
                        ));
                    }
                }
            }
            None => match buf[body_start..].iter().position(|byte| *byte == 0) {
                Some(offset) => body_start + offset,
                None => return Ok(None),
            },
        };

        frame.body = utf8(&buf[body_start..body_end])?.to_string();
        Ok(Some((frame, body_end + 1)))
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|err| ChatError::Protocol(format!("invalid utf-8: {err}")))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ChatError::Protocol(format!(
                    "undefined header escape `\\{}`",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/// `heart-beat` header value: `<send ms>,<receive ms>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub send_ms: u64,
    pub recv_ms: u64,
}

impl HeartBeat {
    pub fn new(send_ms: u64, recv_ms: u64) -> Self {
        Self { send_ms, recv_ms }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || ChatError::Protocol(format!("invalid heart-beat `{raw}`"));
        let (send, recv) = raw.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            send_ms: send.trim().parse().map_err(|_| invalid())?,
            recv_ms: recv.trim().parse().map_err(|_| invalid())?,
        })
    }

    /// Returns `(outgoing, incoming)` intervals agreed between the two offers.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> (Option<Duration>, Option<Duration>) {
        let pick = |ours: u64, theirs: u64| {
            (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
        };
        (
            pick(client.send_ms, server.recv_ms),
            pick(server.send_ms, client.recv_ms),
        )
    }
}

impl std::fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.send_ms, self.recv_ms)
    }
}
