use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Jid, MediaKind, MessageDirection};

/// Identifies one message within a chat, in the transport's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_jid: Option<Jid>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "media", rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    Media(MediaKind),
    /// Internal synchronization and history-sync markers.
    ProtocolControl,
}

/// Whether the event is a live notification or a replay of stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Live,
    History,
}

/// One received event, immutable once constructed. `content` carries the
/// transport's raw message body and is forwarded to the webhook unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub key: MessageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PayloadKind>,
    #[serde(default)]
    pub content: serde_json::Value,
    pub origin: MessageOrigin,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn direction(&self) -> MessageDirection {
        if self.key.from_me {
            MessageDirection::Outgoing
        } else {
            MessageDirection::Incoming
        }
    }
}

/// Classified cause of a session close. Only an explicit logout is terminal;
/// every other cause is treated as transient and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    LoggedOut,
    ConnectionReplaced,
    RestartRequired,
    BadSession,
    ConnectionClosed,
    ConnectionLost,
    ServiceUnavailable,
    Unknown(u16),
}

impl DisconnectReason {
    pub fn from_status_code(code: u16) -> Self {
        match code {
            401 => Self::LoggedOut,
            408 => Self::ConnectionLost,
            428 => Self::ConnectionClosed,
            440 => Self::ConnectionReplaced,
            500 => Self::BadSession,
            503 => Self::ServiceUnavailable,
            515 => Self::RestartRequired,
            other => Self::Unknown(other),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedOut => f.write_str("logged_out"),
            Self::ConnectionReplaced => f.write_str("connection_replaced"),
            Self::RestartRequired => f.write_str("restart_required"),
            Self::BadSession => f.write_str("bad_session"),
            Self::ConnectionClosed => f.write_str("connection_closed"),
            Self::ConnectionLost => f.write_str("connection_lost"),
            Self::ServiceUnavailable => f.write_str("service_unavailable"),
            Self::Unknown(code) => write!(f, "unknown_{code}"),
        }
    }
}

/// Session lifecycle notifications published by the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    PairingChallenge { code: String },
    Connected,
    Disconnected { reason: DisconnectReason },
}

/// Verdict of the inbound event filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDecision {
    Relay,
    Ignore,
    SystemNotice,
}

/// An outbound operation as received from the command surface, prior to
/// validation and target normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    SendText { to: String, text: String },
    SendMedia { to: String, media: MediaRequest },
    SendReaction { to: String, reaction: String, key: MessageKey },
    SendPresence { to: String, presence: String },
    MarkViewed { jid: String },
    FetchProfilePicture { to: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaRequest {
    Audio { bytes: Vec<u8> },
    ImageFromUrl { url: String, caption: Option<String> },
}

/// JSON body returned by every successful gateway route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}
