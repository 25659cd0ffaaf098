use std::sync::Arc;

use session_core::ConnectionRegistry;
use shared::{
    domain::{Jid, Presence, USER_SERVER_SUFFIX},
    error::CommandError,
    protocol::{MediaRequest, MessageKey, OutboundCommand},
};
use tracing::debug;
use transport::{MediaPayload, SessionHandle, TransportError};
use url::Url;

/// Upper bound for raw binary audio payloads.
pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct GatewayContext {
    pub registry: Arc<ConnectionRegistry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Sent { message: String },
    ProfilePicture { url: Url },
}

impl CommandOutcome {
    fn sent(message: impl Into<String>) -> Self {
        Self::Sent {
            message: message.into(),
        }
    }
}

/// Validates and executes one outbound command against the currently
/// registered connection. Validation always runs before the connection-state
/// check; the handle is snapshotted once and kept for the whole call.
pub async fn execute(
    ctx: &GatewayContext,
    command: OutboundCommand,
) -> Result<CommandOutcome, CommandError> {
    validate(&command)?;
    let Some(handle) = ctx.registry.get().await else {
        debug!("command rejected: no active session");
        return Err(CommandError::NotConnected);
    };
    dispatch(handle, command).await
}

fn validate(command: &OutboundCommand) -> Result<(), CommandError> {
    match command {
        OutboundCommand::SendText { to, text } => {
            if to.is_empty() || text.is_empty() {
                return Err(CommandError::validation(
                    "Parâmetros \"to\" e \"text\" são obrigatórios.",
                ));
            }
        }
        OutboundCommand::SendMedia {
            to,
            media: MediaRequest::Audio { bytes },
        } => {
            if to.is_empty() {
                return Err(CommandError::validation(
                    "Parâmetro \"to\" na URL é obrigatório.",
                ));
            }
            if bytes.is_empty() {
                return Err(CommandError::validation("Corpo de áudio vazio."));
            }
            if bytes.len() > MAX_AUDIO_BYTES {
                return Err(CommandError::validation(
                    "Áudio excede o tamanho máximo de 10MB.",
                ));
            }
        }
        OutboundCommand::SendMedia {
            to,
            media: MediaRequest::ImageFromUrl { url, .. },
        } => {
            if to.is_empty() || url.is_empty() {
                return Err(CommandError::validation(
                    "Parâmetros \"to\" e \"url\" são obrigatórios.",
                ));
            }
            if Url::parse(url).is_err() {
                return Err(CommandError::validation("URL da imagem inválida."));
            }
        }
        OutboundCommand::SendReaction { to, reaction, key } => {
            if to.is_empty() || reaction.is_empty() || key.id.is_empty() {
                return Err(CommandError::validation(
                    "Parâmetros \"to\", \"reaction\" e \"messageKey\" (com ID) são obrigatórios.",
                ));
            }
        }
        OutboundCommand::SendPresence { to, presence } => {
            if to.is_empty() || presence.is_empty() {
                return Err(CommandError::validation(
                    "Parâmetros \"to\" e \"presence\" são obrigatórios.",
                ));
            }
            if Presence::parse(presence).is_none() {
                return Err(CommandError::validation("Parâmetro \"presence\" inválido."));
            }
        }
        OutboundCommand::MarkViewed { jid } => {
            // Story receipts address a poster directly; the identity must
            // already be in canonical person-to-person form.
            if !jid.ends_with(USER_SERVER_SUFFIX) {
                return Err(CommandError::validation("Parâmetro \"jid\" inválido."));
            }
        }
        OutboundCommand::FetchProfilePicture { to } => {
            if to.is_empty() {
                return Err(CommandError::validation("Parâmetro \"to\" é obrigatório."));
            }
        }
    }
    Ok(())
}

async fn dispatch(
    handle: Arc<dyn SessionHandle>,
    command: OutboundCommand,
) -> Result<CommandOutcome, CommandError> {
    match command {
        OutboundCommand::SendText { to, text } => {
            let to = Jid::normalize(&to);
            handle
                .send_text(&to, &text)
                .await
                .map_err(transport_failure)?;
            Ok(CommandOutcome::sent("Mensagem de texto enviada."))
        }
        OutboundCommand::SendMedia {
            to,
            media: MediaRequest::Audio { bytes },
        } => {
            let to = Jid::normalize(&to);
            handle
                .send_media(
                    &to,
                    MediaPayload::Audio {
                        bytes,
                        voice_note: true,
                    },
                )
                .await
                .map_err(transport_failure)?;
            Ok(CommandOutcome::sent("Áudio binário enviado."))
        }
        OutboundCommand::SendMedia {
            to,
            media: MediaRequest::ImageFromUrl { url, caption },
        } => {
            let to = Jid::normalize(&to);
            let url = Url::parse(&url)
                .map_err(|_| CommandError::validation("URL da imagem inválida."))?;
            handle
                .send_media(
                    &to,
                    MediaPayload::Image {
                        url,
                        caption: caption.unwrap_or_default(),
                    },
                )
                .await
                .map_err(transport_failure)?;
            Ok(CommandOutcome::sent("Imagem da URL enviada."))
        }
        OutboundCommand::SendReaction { to, reaction, key } => {
            let to = Jid::normalize(&to);
            handle
                .send_reaction(&to, key, &reaction)
                .await
                .map_err(transport_failure)?;
            Ok(CommandOutcome::sent(format!("Reação '{reaction}' enviada.")))
        }
        OutboundCommand::SendPresence { to, presence } => {
            let target = Jid::normalize(&to);
            let presence = Presence::parse(&presence)
                .ok_or_else(|| CommandError::validation("Parâmetro \"presence\" inválido."))?;
            handle
                .send_presence(&target, presence)
                .await
                .map_err(transport_failure)?;
            Ok(CommandOutcome::sent(format!(
                "Status '{}' enviado para o chat {to}.",
                presence.as_str()
            )))
        }
        OutboundCommand::MarkViewed { jid } => {
            let poster = Jid::new(jid);
            // Per-poster receipt: scoped to the broadcast-status identity
            // with the poster as participant, no message id.
            let key = MessageKey {
                remote_jid: Some(Jid::status_broadcast()),
                from_me: false,
                id: String::new(),
                participant: Some(poster.clone()),
            };
            handle
                .read_messages(vec![key])
                .await
                .map_err(transport_failure)?;
            Ok(CommandOutcome::sent(format!(
                "Status de {poster} marcado como visto."
            )))
        }
        OutboundCommand::FetchProfilePicture { to } => {
            let to = Jid::normalize(&to);
            match handle.profile_picture_url(&to).await {
                Ok(Some(url)) => Ok(CommandOutcome::ProfilePicture { url }),
                Ok(None) => Err(profile_picture_not_found()),
                Err(err) => {
                    debug!(%err, jid = %to, "profile picture fetch failed");
                    Err(profile_picture_not_found())
                }
            }
        }
    }
}

fn transport_failure(err: TransportError) -> CommandError {
    CommandError::Transport(err.to_string())
}

fn profile_picture_not_found() -> CommandError {
    CommandError::NotFound("Foto de perfil não encontrada ou é privada.".to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
