use std::time::Duration;

use anyhow::Context;
use shared::protocol::{InboundMessage, RelayDecision};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::filter::{classify, FilterOptions};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook endpoint returned status {status}")]
    Status { status: u16 },
}

/// Best-effort delivery of relayed events to one configured HTTP endpoint.
/// At-most-once: failures are reported to the caller and nothing is retried.
pub struct WebhookRelay {
    http: reqwest::Client,
    endpoint: Option<Url>,
}

impl WebhookRelay {
    /// The timeout bounds every delivery attempt so a stuck endpoint can
    /// never stall the event pump.
    pub fn new(endpoint: Option<Url>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;
        Ok(Self { http, endpoint })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Posts the raw message structure to the endpoint. A no-op when no
    /// endpoint is configured.
    pub async fn deliver(&self, message: &InboundMessage) -> Result<(), DeliveryError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };
        let response = self.http.post(endpoint.clone()).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Consumes the connector's inbound channel in delivery order: classify each
/// event, forward the accepted ones, log and drop failures. Runs until the
/// sending side is gone.
pub async fn run_relay(
    mut inbound: mpsc::Receiver<InboundMessage>,
    options: FilterOptions,
    relay: WebhookRelay,
) {
    while let Some(message) = inbound.recv().await {
        match classify(&message, &options) {
            RelayDecision::Relay => {
                if !relay.is_configured() {
                    continue;
                }
                let direction = message.direction().as_str();
                match relay.deliver(&message).await {
                    Ok(()) => {
                        info!(direction, remote = ?message.key.remote_jid, "webhook delivered");
                    }
                    Err(err) => {
                        warn!(%err, remote = ?message.key.remote_jid, "webhook delivery failed");
                    }
                }
            }
            RelayDecision::Ignore => {}
            RelayDecision::SystemNotice => {
                debug!(remote = ?message.key.remote_jid, "transport notice skipped");
            }
        }
    }
    debug!("inbound channel closed; relay pump stopped");
}
