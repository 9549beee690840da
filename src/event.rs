// ABOUTME: SSE event serialization and chunked-transfer framing
// ABOUTME: Hex-size-prefixed chunks wrapping event/data/id wire lines

//! An [`Event`] is a single Server-Sent Event: a notify, a ping, or a
//! logout, each framed as one chunked-transfer chunk.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A single event-stream event: `event: <type>\r\ndata: <data>\r\n[id:
/// <id>\r\n]\r\n`.
#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    data: String,
    id: Option<String>,
}

impl Event {
    /// Construct a raw event. `data` is written as-is; callers needing
    /// multi-line payloads must pre-encode (e.g. as JSON).
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            id: None,
        }
    }

    /// Attach an event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.id = (!id.is_empty()).then_some(id);
        self
    }

    /// A keep-alive ping: type `"ping"`, empty data, emitted on a timer.
    #[must_use]
    pub fn ping() -> Self {
        Self::new("ping", "")
    }

    /// A JSON-payload event: non-string payloads are JSON-encoded; a
    /// string payload is passed through verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` fails to serialize.
    pub fn json(
        event_type: impl Into<String>,
        payload: &impl Serialize,
        id: Option<String>,
    ) -> serde_json::Result<Self> {
        let data = match serde_json::to_value(payload)? {
            serde_json::Value::String(s) => s,
            other => serde_json::to_string(&other)?,
        };
        let mut event = Self::new(event_type, data);
        if let Some(id) = id {
            event = event.with_id(id);
        }
        Ok(event)
    }

    /// A logout notification: a JSON event of type `"logout"` with
    /// payload `{"reason":"expire"}`.
    #[must_use]
    pub fn logout() -> Self {
        Self::new("logout", r#"{"reason":"expire"}"#)
    }

    /// Serialize for the wire: `event: ...\r\ndata: ...\r\n[id: ...\r\n]\r\n`.
    #[must_use]
    pub fn to_wire_string(&self) -> String {
        let mut out = format!("event: {}\r\ndata: {}\r\n", self.event_type, self.data);
        if let Some(id) = &self.id {
            out.push_str(&format!("id: {id}\r\n"));
        }
        out.push_str("\r\n");
        out
    }
}

/// Write `data` as a single HTTP chunked-transfer chunk: `hex-size\r\n<bytes>\r\n`.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    let header = format!("{:x}\r\n", data.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(data).await?;
    writer.write_all(b"\r\n").await?;
    tracing::trace!(bytes = data.len(), "wrote chunk to listener");
    Ok(())
}

/// Write the zero-length terminating chunk (`0\r\n\r\n`) that marks
/// end-of-stream.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub async fn write_last_chunk<W: AsyncWrite + Unpin>(writer: &mut W) -> std::io::Result<()> {
    write_chunk(writer, b"").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_event_round_trip() {
        let event = Event::new("add", "test-data");
        assert_eq!(event.to_wire_string(), "event: add\r\ndata: test-data\r\n\r\n");
    }

    #[test]
    fn event_with_id_inserts_id_line_before_terminator() {
        let event = Event::new("upd", "test-data").with_id("7");
        assert_eq!(
            event.to_wire_string(),
            "event: upd\r\ndata: test-data\r\nid: 7\r\n\r\n"
        );
    }

    #[test]
    fn empty_id_is_omitted() {
        let event = Event::new("add", "d").with_id("");
        assert_eq!(event.to_wire_string(), "event: add\r\ndata: d\r\n\r\n");
    }

    #[test]
    fn ping_event_has_empty_data() {
        assert_eq!(Event::ping().to_wire_string(), "event: ping\r\ndata: \r\n\r\n");
    }

    #[test]
    fn logout_event_payload() {
        assert_eq!(
            Event::logout().to_wire_string(),
            "event: logout\r\ndata: {\"reason\":\"expire\"}\r\n\r\n"
        );
    }

    #[test]
    fn json_event_encodes_non_string_payload() {
        let event = Event::json("upd", &serde_json::json!({"x": 1}), Some("7".to_owned())).unwrap();
        assert_eq!(
            event.to_wire_string(),
            "event: upd\r\ndata: {\"x\":1}\r\nid: 7\r\n\r\n"
        );
    }

    #[test]
    fn json_event_passes_through_string_payload() {
        let event = Event::json("upd", &"already-a-string".to_owned(), None).unwrap();
        assert_eq!(event.to_wire_string(), "event: upd\r\ndata: already-a-string\r\n\r\n");
    }

    #[tokio::test]
    async fn chunk_framing() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"hello").await.unwrap();
        assert_eq!(buf, b"5\r\nhello\r\n");
    }

    #[tokio::test]
    async fn last_chunk_is_zero_length() {
        let mut buf = Vec::new();
        write_last_chunk(&mut buf).await.unwrap();
        assert_eq!(buf, b"0\r\n\r\n");
    }
}
