//! Protocol envelope.
//!
//! Wire shape (JSON):
//!
//! ```text
//! { "marker": true, "id": "...", "tunnel"?: "...", "data": <any>, "replyTo"?: "..." }
//! ```
//!
//! `replyTo` present marks an answer, absent marks a request.

use crate::domain::message_id::MessageId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the sentinel field that tags protocol traffic.
pub const MARKER_KEY: &str = "marker";

/// The unit wrapping every payload exchanged through the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

/// Request or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind<'a> {
    Request,
    Answer { reply_to: &'a MessageId },
}

impl Envelope {
    pub fn request(id: MessageId, tunnel: Option<String>, data: Value) -> Self {
        Self {
            id,
            tunnel,
            data,
            reply_to: None,
        }
    }

    pub fn answer(id: MessageId, tunnel: Option<String>, data: Value, reply_to: MessageId) -> Self {
        Self {
            id,
            tunnel,
            data,
            reply_to: Some(reply_to),
        }
    }

    pub fn kind(&self) -> EnvelopeKind<'_> {
        match &self.reply_to {
            Some(reply_to) => EnvelopeKind::Answer { reply_to },
            None => EnvelopeKind::Request,
        }
    }

    /// Encode as a transport frame, marker included.
    pub fn into_frame(self) -> Value {
        let mut frame = Map::new();
        frame.insert(MARKER_KEY.into(), Value::Bool(true));
        frame.insert("id".into(), Value::String(self.id.to_string()));
        if let Some(tunnel) = self.tunnel {
            frame.insert("tunnel".into(), Value::String(tunnel));
        }
        frame.insert("data".into(), self.data);
        if let Some(reply_to) = self.reply_to {
            frame.insert("replyTo".into(), Value::String(reply_to.to_string()));
        }
        Value::Object(frame)
    }

    /// Decode a transport frame.
    ///
    /// Returns `None` for anything that is not protocol traffic: non-objects,
    /// a missing or falsy marker, or a malformed envelope.
    pub fn from_frame(frame: &Value) -> Option<Self> {
        let marker = frame.as_object()?.get(MARKER_KEY)?;
        if !is_truthy(marker) {
            return None;
        }

        let mut envelope = Self::deserialize(frame).ok()?;
        // An empty back-reference does not make an answer.
        if envelope.reply_to.as_ref().is_some_and(MessageId::is_empty) {
            envelope.reply_to = None;
        }
        Some(envelope)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
