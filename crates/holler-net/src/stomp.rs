//! Minimal STOMP 1.2 frame codec, client-side.
//!
//! One websocket text message carries exactly one frame (or a lone LF
//! heartbeat). Frames are `COMMAND\nheaders\n\nbody\0`; header values are
//! escaped on every frame except `CONNECT`/`CONNECTED`, per the 1.2 spec.

use thiserror::Error;

use holler_shared::constants::STOMP_VERSION;

/// Errors produced while encoding or parsing frames.
#[derive(Error, Debug)]
pub enum StompError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid header escape sequence: {0}")]
    BadEscape(String),
}

/// Frame commands this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Send,
    Message,
    Error,
    Receipt,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Error => "ERROR",
            Command::Receipt => "RECEIPT",
            Command::Disconnect => "DISCONNECT",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StompError> {
        match s {
            "CONNECT" => Ok(Command::Connect),
            "CONNECTED" => Ok(Command::Connected),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "SEND" => Ok(Command::Send),
            "MESSAGE" => Ok(Command::Message),
            "ERROR" => Ok(Command::Error),
            "RECEIPT" => Ok(Command::Receipt),
            "DISCONNECT" => Ok(Command::Disconnect),
            other => Err(StompError::UnknownCommand(other.to_string())),
        }
    }

    /// CONNECT/CONNECTED headers are exchanged unescaped; all other frames
    /// escape header names and values.
    fn headers_escaped(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

/// A single STOMP frame. First occurrence of a repeated header wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn connect(host: &str, heartbeat: (u32, u32)) -> Self {
        Self {
            command: Command::Connect,
            headers: vec![
                ("accept-version".into(), STOMP_VERSION.into()),
                ("host".into(), host.into()),
                ("heart-beat".into(), format!("{},{}", heartbeat.0, heartbeat.1)),
            ],
            body: String::new(),
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self {
            command: Command::Subscribe,
            headers: vec![
                ("id".into(), id.into()),
                ("destination".into(), destination.into()),
            ],
            body: String::new(),
        }
    }

    pub fn send(destination: &str, body: String) -> Self {
        Self {
            command: Command::Send,
            headers: vec![
                ("destination".into(), destination.into()),
                ("content-type".into(), "application/json".into()),
                ("content-length".into(), body.len().to_string()),
            ],
            body,
        }
    }

    pub fn disconnect() -> Self {
        Self {
            command: Command::Disconnect,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// First value of the named header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse the `heart-beat` header (`"sx,sy"` in milliseconds).
    pub fn heart_beat(&self) -> Option<(u32, u32)> {
        let raw = self.header("heart-beat")?;
        let (sx, sy) = raw.split_once(',')?;
        Some((sx.trim().parse().ok()?, sy.trim().parse().ok()?))
    }

    /// Serialize to the on-wire text form, NUL terminator included.
    pub fn encode(&self) -> String {
        let escaped = self.command.headers_escaped();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (k, v) in &self.headers {
            if escaped {
                out.push_str(&escape(k));
                out.push(':');
                out.push_str(&escape(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one websocket text message. `Ok(None)` means the message was a
    /// heartbeat, not a frame.
    pub fn parse(raw: &str) -> Result<Option<Self>, StompError> {
        if raw.is_empty() || raw == "\n" || raw == "\r\n" {
            return Ok(None);
        }

        let raw = raw
            .strip_suffix('\0')
            .ok_or_else(|| StompError::Malformed("missing NUL terminator".into()))?;

        // The header block ends at the first blank line, with either LF or
        // CRLF line endings.
        let (sep, body_start) = match (raw.find("\n\n"), raw.find("\r\n\r\n")) {
            (Some(lf), Some(crlf)) if crlf < lf => (crlf, crlf + 4),
            (Some(lf), _) => (lf, lf + 2),
            (None, Some(crlf)) => (crlf, crlf + 4),
            (None, None) => {
                return Err(StompError::Malformed("missing header/body separator".into()))
            }
        };
        let head = &raw[..sep];
        let mut body = &raw[body_start..];

        let mut lines = head.lines();
        let command_line = lines
            .next()
            .ok_or_else(|| StompError::Malformed("empty frame".into()))?;
        let command = Command::parse(command_line.trim_end_matches('\r'))?;
        let escaped = command.headers_escaped();

        let mut headers = Vec::new();
        for line in lines {
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| StompError::Malformed(format!("header without colon: {line}")))?;
            if escaped {
                headers.push((unescape(k)?, unescape(v)?));
            } else {
                headers.push((k.to_string(), v.to_string()));
            }
        }

        let frame = Frame {
            command,
            headers,
            body: String::new(),
        };

        // Honor content-length when present; otherwise the NUL terminator
        // already bounded the body.
        if let Some(len) = frame
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
        {
            if len > body.len() {
                return Err(StompError::Malformed(format!(
                    "content-length {len} exceeds body of {} bytes",
                    body.len()
                )));
            }
            body = std::str::from_utf8(&body.as_bytes()[..len])
                .map_err(|_| StompError::Malformed("content-length splits a character".into()))?;
        }

        Ok(Some(Frame {
            body: body.to_string(),
            ..frame
        }))
    }
}

fn escape(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
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

fn unescape(v: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(v.len());
    let mut chars = v.chars();
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
            other => {
                let seq = other.map(|c| c.to_string()).unwrap_or_default();
                return Err(StompError::BadEscape(format!("\\{seq}")));
            }
        }
    }
    Ok(out)
}
