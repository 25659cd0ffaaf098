use std::fmt;

use serde::{Deserialize, Serialize};

/// Server suffix for person-to-person chats.
pub const USER_SERVER_SUFFIX: &str = "@s.whatsapp.net";

/// Reserved pseudo-identity carrying status/story updates.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// A fully-qualified identity on the messaging network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn status_broadcast() -> Self {
        Self(STATUS_BROADCAST_JID.to_string())
    }

    /// Appends the person-to-person server suffix when it is not already
    /// present, mirroring the addressing form the transport expects.
    pub fn normalize(raw: &str) -> Self {
        if raw.contains(USER_SERVER_SUFFIX) {
            Self(raw.to_string())
        } else {
            Self(format!("{raw}{USER_SERVER_SUFFIX}"))
        }
    }

    pub fn is_user(&self) -> bool {
        self.0.ends_with(USER_SERVER_SUFFIX)
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.0 == STATUS_BROADCAST_JID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "INCOMING",
            Self::Outgoing => "OUTGOING",
        }
    }
}

/// Chat presence signals understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

impl Presence {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "available" => Some(Self::Available),
            "unavailable" => Some(Self::Unavailable),
            "composing" => Some(Self::Composing),
            "recording" => Some(Self::Recording),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Composing => "composing",
            Self::Recording => "recording",
            Self::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Document,
    Sticker,
}
