use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{Jid, Presence},
    protocol::{DisconnectReason, InboundMessage, MessageKey},
};
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

mod credentials;

pub use credentials::{CredentialStore, FileCredentialStore, SessionCredentials};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("connection closed: {reason}")]
    Closed { reason: DisconnectReason },
    #[error("transport protocol error: {0}")]
    Protocol(String),
}

/// Media forms accepted by [`SessionHandle::send_media`], already validated
/// by the command gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaPayload {
    /// Raw audio bytes, sent as a voice note when `voice_note` is set.
    Audio { bytes: Vec<u8>, voice_note: bool },
    /// An image the transport fetches from `url` on the caller's behalf.
    Image { url: Url, caption: String },
}

/// The ordered stream of events one `connect` call produces.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A scannable pairing token the operator must approve out of band.
    PairingChallenge { code: String },
    Opened,
    CredentialsUpdate(SessionCredentials),
    Closed { reason: DisconnectReason },
    Message(InboundMessage),
}

/// Operations available on one established session. Implementations are
/// supplied by the protocol backend; all calls may suspend.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<(), TransportError>;
    async fn send_media(&self, to: &Jid, media: MediaPayload) -> Result<(), TransportError>;
    async fn send_reaction(
        &self,
        to: &Jid,
        key: MessageKey,
        reaction: &str,
    ) -> Result<(), TransportError>;
    async fn send_presence(&self, to: &Jid, presence: Presence) -> Result<(), TransportError>;
    async fn read_messages(&self, keys: Vec<MessageKey>) -> Result<(), TransportError>;
    /// `Ok(None)` means the picture is absent or privacy-restricted.
    async fn profile_picture_url(&self, jid: &Jid) -> Result<Option<Url>, TransportError>;
}

/// Entry point into the protocol backend: performs the handshake with the
/// supplied credentials and yields the live handle plus its event stream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<(Arc<dyn SessionHandle>, mpsc::Receiver<TransportEvent>), TransportError>;
}

/// Placeholder backend for builds without a linked protocol library; every
/// connect attempt fails and the service stays offline.
pub struct MissingTransport;

#[async_trait]
impl Transport for MissingTransport {
    async fn connect(
        &self,
        _credentials: &SessionCredentials,
    ) -> Result<(Arc<dyn SessionHandle>, mpsc::Receiver<TransportEvent>), TransportError> {
        Err(TransportError::Protocol(
            "no messaging transport backend is available".to_string(),
        ))
    }
}
