use crate::error::{Error, ErrorKind, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Ordering key attached to a frame and echoed back by reconnecting clients
/// through `Last-Event-ID`. Only ever compared, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Milliseconds since the Unix epoch.
    pub fn now() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self(u64::try_from(millis).unwrap_or_default())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(EventId)
    }
}

/// One logical server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    event: Option<String>,
    data: String,
    id: Option<EventId>,
}

impl Frame {
    /// `data` must already be a single line (typically JSON text); nothing is escaped here.
    pub fn new(data: impl Into<String>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(ErrorKind::EmptyPayload.into());
        }

        Ok(Self {
            event: None,
            data,
            id: None,
        })
    }

    pub fn with_id(mut self, id: Option<EventId>) -> Self {
        self.id = id;
        self
    }

    /// An empty event type is the same as no event type.
    pub fn with_event(mut self, event: Option<&str>) -> Self {
        self.event = event.filter(|e| !e.is_empty()).map(str::to_owned);
        self
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn id(&self) -> Option<EventId> {
        self.id
    }

    pub fn encode(&self) -> EncodedFrame {
        let mut text = String::with_capacity(self.data.len() + 32);
        if let Some(event) = &self.event {
            text.push_str("event:");
            text.push_str(event);
            text.push('\n');
        }
        text.push_str("data:");
        text.push_str(&self.data);
        text.push('\n');
        if let Some(id) = self.id {
            text.push_str("id:");
            text.push_str(&id.to_string());
            text.push('\n');
        }
        text.push('\n');

        EncodedFrame(Arc::from(text))
    }

    /// Parses the text of a single frame, as produced by [`Frame::encode`].
    /// Comment lines and unknown fields are skipped.
    pub fn decode(text: &str) -> Result<Self> {
        let mut event = None;
        let mut data: Option<String> = None;
        let mut id = None;

        for line in text.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            match field {
                "event" => event = Some(value.to_owned()),
                "data" => match data.as_mut() {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                },
                "id" => {
                    let parsed = value.parse::<EventId>().map_err(|e| Error {
                        source: Some(Box::new(e)),
                        error_kind: ErrorKind::MalformedFrame(format!("invalid id `{value}`")),
                    })?;
                    id = Some(parsed);
                }
                _ => {}
            }
        }

        let data = data.ok_or_else(|| {
            Error::from(ErrorKind::MalformedFrame("missing data field".to_string()))
        })?;

        Ok(Frame::new(data)?
            .with_event(event.as_deref())
            .with_id(id))
    }
}

/// Wire text of an encoded frame, shared between every listener queue and the history ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame(Arc<str>);

impl EncodedFrame {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EncodedFrame> for String {
    fn from(frame: EncodedFrame) -> Self {
        frame.0.to_string()
    }
}
