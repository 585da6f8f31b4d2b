// crates/channel/src/frame.rs
//! STOMP 1.2 text frames

use crate::error::{ChannelError, ChannelResult};
use crate::heartbeat::HeartBeat;
use std::fmt;
use std::str::FromStr;

/// STOMP frame commands used by the notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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
    /// Wire spelling of the command
    pub fn as_str(&self) -> &'static str {
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

    /// CONNECT-family frames carry their headers unescaped
    fn escapes_headers(&self) -> bool {
        !matches!(
            self,
            Command::Connect | Command::Stomp | Command::Connected
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Command::Connect),
            "STOMP" => Ok(Command::Stomp),
            "CONNECTED" => Ok(Command::Connected),
            "SEND" => Ok(Command::Send),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "DISCONNECT" => Ok(Command::Disconnect),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(ChannelError::Frame(format!("unknown command '{}'", other))),
        }
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order; repeated names keep the first value
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// Creates a frame with no headers and an empty body
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends a header (builder style)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body (builder style)
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the named header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// CONNECT frame opening a session
    pub fn connect(host: &str, token: Option<&str>, heartbeat: HeartBeat) -> Self {
        let frame = Frame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", heartbeat.to_string());
        match token {
            Some(token) => frame.with_header("Authorization", format!("Bearer {}", token)),
            None => frame,
        }
    }

    /// SUBSCRIBE frame with automatic acknowledgement
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// UNSUBSCRIBE frame for a subscription id
    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).with_header("id", id)
    }

    /// DISCONNECT frame, optionally asking for a receipt
    pub fn disconnect(receipt: Option<&str>) -> Self {
        let frame = Frame::new(Command::Disconnect);
        match receipt {
            Some(receipt) => frame.with_header("receipt", receipt),
            None => frame,
        }
    }

    /// Serializes the frame, NUL terminator included
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses every frame in one transport message
    ///
    /// Bare end-of-line sequences are heart-beats and yield no frame, so a
    /// pure heart-beat message parses to an empty list.
    pub fn parse_all(input: &str) -> ChannelResult<Vec<Frame>> {
        let mut frames = Vec::new();
        let mut rest = input;
        loop {
            rest = rest.trim_start_matches(['\r', '\n']);
            if rest.is_empty() {
                break;
            }
            let (frame, remaining) = parse_one(rest)?;
            frames.push(frame);
            rest = remaining;
        }
        Ok(frames)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(destination) = self.header("destination") {
            write!(f, " {}", destination)?;
        }
        Ok(())
    }
}

/// Splits off one line, accepting both LF and CRLF endings
fn split_line(input: &str) -> Option<(&str, &str)> {
    let idx = input.find('\n')?;
    let line = &input[..idx];
    let line = line.strip_suffix('\r').unwrap_or(line);
    Some((line, &input[idx + 1..]))
}

fn parse_one(input: &str) -> ChannelResult<(Frame, &str)> {
    let (command_line, mut rest) =
        split_line(input).ok_or_else(|| ChannelError::Frame("missing command line".into()))?;
    let command: Command = command_line.parse()?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = split_line(rest)
            .ok_or_else(|| ChannelError::Frame("unterminated header block".into()))?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ChannelError::Frame(format!("header without ':' in '{}'", line)))?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let mut frame = Frame {
        command,
        headers,
        body: String::new(),
    };

    let content_length = frame
        .header("content-length")
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| ChannelError::Frame(format!("bad content-length '{}'", v)))
        })
        .transpose()?;

    let (body, remaining) = match content_length {
        Some(len) => {
            let body = rest
                .get(..len)
                .ok_or_else(|| ChannelError::Frame("body shorter than content-length".into()))?;
            let after = rest[len..]
                .strip_prefix('\0')
                .ok_or_else(|| ChannelError::Frame("missing NUL after body".into()))?;
            (body, after)
        }
        None => {
            let end = rest
                .find('\0')
                .ok_or_else(|| ChannelError::Frame("unterminated frame body".into()))?;
            (&rest[..end], &rest[end + 1..])
        }
    };

    frame.body = body.to_string();
    Ok((frame, remaining))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> ChannelResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some(other) => {
                return Err(ChannelError::Frame(format!(
                    "undefined escape '\\{}' in header",
                    other
                )))
            }
            None => return Err(ChannelError::Frame("dangling '\\' in header".into())),
        }
    }
    Ok(out)
}
