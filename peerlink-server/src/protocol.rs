//! Wire protocol: one JSON envelope per WebSocket text frame.
//!
//! Frames look like `{"type": "OFFER", "data": {…}}`. Offer, answer, and
//! candidate payloads are opaque passthrough blobs — the relay never
//! inspects SDP or ICE contents, it only re-serializes them toward the
//! target session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user's availability, as propagated to their social graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnlineState {
    Offline,
    Online,
    DoNotDisturb,
}

/// One typed message exchanged over a transport session.
///
/// `OfferResponse` is server-synthesized only: it reports an unreachable
/// OFFER target back to the sender, with `from_id` naming the target that
/// could not be reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Envelope {
    #[serde(rename = "OFFER")]
    Offer {
        from_id: String,
        to_id: String,
        offer: serde_json::Value,
    },
    #[serde(rename = "ANSWER")]
    Answer {
        from_id: String,
        to_id: String,
        answer: serde_json::Value,
    },
    #[serde(rename = "CANDIDATE")]
    Candidate {
        from_id: String,
        to_id: String,
        candidate: serde_json::Value,
    },
    #[serde(rename = "ONLINE_STATE_CHANGE")]
    OnlineStateChange {
        from_id: String,
        online_state: OnlineState,
    },
    #[serde(rename = "LEAVE")]
    Leave { from_id: String },
    #[serde(rename = "OFFER_RESPONSE")]
    OfferResponse { from_id: String, success: bool },
}

/// Why an inbound frame could not be turned into an [`Envelope`].
///
/// Only `Malformed` is terminal for the connection that produced it;
/// `MissingTag` and `UnknownVariant` frames are logged and ignored.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame has no \"type\" tag")]
    MissingTag,
    #[error("unrecognized message type {0:?}")]
    UnknownVariant(String),
}

const KNOWN_TAGS: &[&str] = &[
    "OFFER",
    "ANSWER",
    "CANDIDATE",
    "ONLINE_STATE_CHANGE",
    "LEAVE",
    "OFFER_RESPONSE",
];

impl Envelope {
    /// Decode one frame. Decoding is two-stage so an unrecognized tag can
    /// be told apart from a frame that is not valid JSON at all.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: serde_json::Value = serde_json::from_str(text)?;
        let tag = frame
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(ProtocolError::MissingTag)?;
        if !KNOWN_TAGS.contains(&tag) {
            return Err(ProtocolError::UnknownVariant(tag.to_string()));
        }
        Ok(serde_json::from_value(frame)?)
    }

    /// Serialize for the wire. Serialization of these variants cannot
    /// fail; the fallback keeps a bug here from killing a session task.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Wire tag, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::Offer { .. } => "OFFER",
            Envelope::Answer { .. } => "ANSWER",
            Envelope::Candidate { .. } => "CANDIDATE",
            Envelope::OnlineStateChange { .. } => "ONLINE_STATE_CHANGE",
            Envelope::Leave { .. } => "LEAVE",
            Envelope::OfferResponse { .. } => "OFFER_RESPONSE",
        }
    }
}
