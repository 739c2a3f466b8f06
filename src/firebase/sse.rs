//! Server-sent events framing and the realtime database's event vocabulary.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One `event:`/`data:` block of a `text/event-stream` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Frames larger than this are dropped rather than buffered forever.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Incremental frame splitter. Chunks may end anywhere, including inside a
/// multi-byte character.
#[derive(Debug)]
pub struct SseParser {
    buf: Vec<u8>,
    /// Bytes of `buf` already searched for a blank line.
    scanned: usize,
    max_frame: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_frame(MAX_FRAME_BYTES)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_frame,
        }
    }

    /// Feed a chunk and return every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        // a separator may straddle the previous chunk boundary
        let mut from = self.scanned.saturating_sub(3);
        while let Some((end, sep)) = frame_end(&self.buf, from) {
            let raw: Vec<u8> = self.buf.drain(..end + sep).collect();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw[..end])) {
                frames.push(frame);
            }
            from = 0;
        }
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_frame {
            tracing::warn!(
                "Discarding {} buffered bytes with no frame boundary",
                self.buf.len()
            );
            self.buf.clear();
            self.scanned = 0;
        }
        frames
    }
}

fn frame_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buf.len()).find_map(|i| {
        let rest = &buf[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_empty() && data.is_empty() {
        return None;
    }
    if event.is_empty() {
        event = "message".to_string();
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}

/// What a streaming frame from the realtime database means.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Replace the value at `path` (relative to the watched location).
    Put { path: String, data: Value },
    /// Overwrite the listed children of `path`.
    Patch {
        path: String,
        data: Map<String, Value>,
    },
    KeepAlive,
    /// Read permission was lost; the server closes the stream.
    Cancel(String),
    /// The credential expired; the server closes the stream.
    AuthRevoked,
}

#[derive(Deserialize)]
struct Payload<T> {
    path: String,
    data: T,
}

impl StreamEvent {
    /// Interpret a frame. Unknown event names yield `Ok(None)`.
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>, serde_json::Error> {
        let event = match frame.event.as_str() {
            "put" => {
                let p: Payload<Value> = serde_json::from_str(&frame.data)?;
                Self::Put {
                    path: p.path,
                    data: p.data,
                }
            }
            "patch" => {
                let p: Payload<Map<String, Value>> = serde_json::from_str(&frame.data)?;
                Self::Patch {
                    path: p.path,
                    data: p.data,
                }
            }
            "keep-alive" => Self::KeepAlive,
            "cancel" => Self::Cancel(frame.data.clone()),
            "auth_revoked" => Self::AuthRevoked,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: put\ndata: {\"path\":\"/\",").is_empty());

        let frames = parser.feed(b"\"data\":{\"rain\":4}}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "put");
        assert_eq!(frames[1].event, "keep-alive");

        assert_eq!(
            StreamEvent::from_frame(&frames[0]).unwrap(),
            Some(StreamEvent::Put {
                path: "/".to_string(),
                data: json!({ "rain": 4 }),
            })
        );
    }

    #[test]
    fn crlf_delimiters_and_comments() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b": hello\r\nevent: auth_revoked\r\ndata: credential is no longer valid\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(
            StreamEvent::from_frame(&frames[0]).unwrap(),
            Some(StreamEvent::AuthRevoked)
        );
    }

    #[test]
    fn multibyte_split_is_reassembled() {
        let payload = "event: put\ndata: {\"path\":\"/t\",\"data\":\"°C\"}\n\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xC2).unwrap() + 1;

        let mut parser = SseParser::new();
        assert!(parser.feed(&payload[..split]).is_empty());
        let frames = parser.feed(&payload[split..]);
        assert_eq!(frames[0].data, "{\"path\":\"/t\",\"data\":\"°C\"}");
    }

    #[test]
    fn separator_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: keep-alive\r\ndata: null\r\n\r").is_empty());

        let frames = parser.feed(b"\nevent: put");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "keep-alive");
    }

    #[test]
    fn oversized_frame_is_discarded() {
        let mut parser = SseParser::with_max_frame(32);
        assert!(parser.feed(b"event: put\ndata: ").is_empty());
        assert!(parser.feed(&[b'x'; 64]).is_empty());

        // the stream recovers at the next complete frame
        let frames = parser.feed(b"\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "keep-alive");
    }

    #[test]
    fn unknown_events_are_ignored() {
        let frame = SseFrame {
            event: "rules_debug".to_string(),
            data: String::new(),
        };
        assert_eq!(StreamEvent::from_frame(&frame).unwrap(), None);
    }
}
