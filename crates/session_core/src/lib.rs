use std::{sync::Arc, time::Duration};

use shared::protocol::{DisconnectReason, InboundMessage, LifecycleEvent};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use transport::{CredentialStore, SessionCredentials, Transport, TransportEvent};

mod filter;
mod registry;
mod relay;

pub use filter::{classify, FilterOptions};
pub use registry::ConnectionRegistry;
pub use relay::{run_relay, DeliveryError, WebhookRelay};

const LIFECYCLE_CHANNEL_CAPACITY: usize = 64;
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Retry behavior for transient session loss. The default reproduces a fixed
/// five-second delay; setting `max_retry_delay` switches to capped
/// exponential backoff. Terminal disconnects are never retried either way.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub retry_delay: Duration,
    pub max_retry_delay: Option<Duration>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            max_retry_delay: None,
        }
    }
}

/// Owns the connect/reconnect state machine for the single account session.
///
/// One long-lived task drives [`SessionConnector::run`]; it is the only
/// writer to the [`ConnectionRegistry`]. Inbound user events go out on an
/// ordered channel consumed by the relay pump, lifecycle transitions on an
/// independent broadcast channel, so neither consumer can stall the other.
pub struct SessionConnector {
    transport: Arc<dyn Transport>,
    credential_store: Arc<dyn CredentialStore>,
    registry: Arc<ConnectionRegistry>,
    config: ConnectorConfig,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    inbound: mpsc::Sender<InboundMessage>,
}

impl SessionConnector {
    pub fn new(
        transport: Arc<dyn Transport>,
        credential_store: Arc<dyn CredentialStore>,
        registry: Arc<ConnectionRegistry>,
        config: ConnectorConfig,
    ) -> (Arc<Self>, mpsc::Receiver<InboundMessage>) {
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let connector = Arc::new(Self {
            transport,
            credential_store,
            registry,
            config,
            lifecycle,
            inbound: inbound_tx,
        });
        (connector, inbound_rx)
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }

    /// Runs the session until a terminal disconnect. Transient losses are
    /// retried indefinitely; there is deliberately no retry ceiling for an
    /// unattended single-account service.
    pub async fn run(self: Arc<Self>, mut credentials: SessionCredentials) {
        let mut delay = self.config.retry_delay;
        loop {
            let (handle, mut events) = match self.transport.connect(&credentials).await {
                Ok(session) => session,
                Err(err) => {
                    warn!(%err, delay_secs = delay.as_secs(), "connect attempt failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = self.next_delay(delay);
                    continue;
                }
            };

            let reason = loop {
                let Some(event) = events.recv().await else {
                    // The backend dropped the stream without a close event.
                    break DisconnectReason::ConnectionLost;
                };
                match event {
                    TransportEvent::PairingChallenge { code } => {
                        info!(%code, "pairing challenge received; approve it from the primary device");
                        let _ = self
                            .lifecycle
                            .send(LifecycleEvent::PairingChallenge { code });
                    }
                    TransportEvent::Opened => {
                        self.registry.set(Some(Arc::clone(&handle))).await;
                        delay = self.config.retry_delay;
                        info!("session established");
                        let _ = self.lifecycle.send(LifecycleEvent::Connected);
                    }
                    TransportEvent::CredentialsUpdate(updated) => {
                        credentials = updated.clone();
                        let store = Arc::clone(&self.credential_store);
                        // Persisting must never block the state machine.
                        tokio::spawn(async move {
                            if let Err(err) = store.persist(&updated).await {
                                error!(%err, "failed to persist session credentials");
                            }
                        });
                    }
                    TransportEvent::Message(message) => {
                        if self.inbound.send(message).await.is_err() {
                            warn!("inbound channel closed; dropping message");
                        }
                    }
                    TransportEvent::Closed { reason } => break reason,
                }
            };

            self.registry.set(None).await;
            let _ = self.lifecycle.send(LifecycleEvent::Disconnected { reason });

            if reason.is_terminal() {
                warn!(%reason, "terminal disconnect; the session will not be retried");
                return;
            }
            info!(%reason, delay_secs = delay.as_secs(), "connection closed; reconnecting");
            tokio::time::sleep(delay).await;
            delay = self.next_delay(delay);
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        match self.config.max_retry_delay {
            Some(cap) => (current * 2).min(cap),
            None => self.config.retry_delay,
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
