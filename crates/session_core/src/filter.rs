use shared::protocol::{InboundMessage, MessageOrigin, PayloadKind, RelayDecision};

/// Behavior switches for the inbound event filter.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Whether echoes of the account's own sent messages are relayed to the
    /// webhook alongside incoming ones.
    pub relay_own_messages: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            relay_own_messages: true,
        }
    }
}

/// Decides whether one received event is a genuine user message worth
/// relaying. Pure function of the message's fields; rules apply in order and
/// the first match wins.
pub fn classify(message: &InboundMessage, options: &FilterOptions) -> RelayDecision {
    // Pure delivery/read receipts and presence notices carry no payload.
    let Some(kind) = message.kind else {
        return RelayDecision::SystemNotice;
    };
    if matches!(kind, PayloadKind::ProtocolControl) {
        return RelayDecision::Ignore;
    }
    if message
        .key
        .remote_jid
        .as_ref()
        .is_some_and(|jid| jid.is_status_broadcast())
    {
        return RelayDecision::Ignore;
    }
    if message.origin == MessageOrigin::History {
        return RelayDecision::Ignore;
    }
    if message.key.from_me && !options.relay_own_messages {
        return RelayDecision::Ignore;
    }
    RelayDecision::Relay
}
