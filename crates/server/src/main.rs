use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use server_api::{execute, CommandOutcome, GatewayContext, MAX_AUDIO_BYTES};
use session_core::{
    run_relay, ConnectionRegistry, ConnectorConfig, FilterOptions, SessionConnector, WebhookRelay,
};
use shared::{
    error::{CommandError, ErrorBody},
    protocol::{Ack, MediaRequest, MessageKey, OutboundCommand},
};
use tracing::{debug, error, info, warn};
use transport::{CredentialStore, FileCredentialStore, MissingTransport, Transport};
use url::Url;

mod config;

use config::load_settings;

#[derive(Clone)]
struct AppState {
    gateway: GatewayContext,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    success: bool,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ProfilePicResponse {
    success: bool,
    url: String,
}

#[derive(Debug, Deserialize)]
struct SendTextRequest {
    to: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudioQuery {
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TargetRequest {
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewStatusRequest {
    jid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendReactionRequest {
    to: Option<String>,
    reaction: Option<String>,
    message_key: Option<MessageKey>,
}

#[derive(Debug, Deserialize)]
struct SendImageRequest {
    to: Option<String>,
    url: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendPresenceRequest {
    to: Option<String>,
    presence: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();

    let credential_store = Arc::new(FileCredentialStore::new(&settings.session_dir));
    let credentials = credential_store
        .load()
        .await
        .map_err(|error| {
            error!(%error, "failed to load session credentials");
            error
        })?
        .unwrap_or_default();
    if !credentials.is_registered() {
        info!("no stored pairing; a pairing challenge will be issued on connect");
    }

    let webhook_url = match settings.webhook_url.as_deref() {
        Some(raw) => Some(Url::parse(raw).context("invalid webhook url")?),
        None => {
            warn!("no webhook url configured; inbound messages will not be relayed");
            None
        }
    };
    let relay = WebhookRelay::new(
        webhook_url,
        Duration::from_secs(settings.webhook_timeout_secs),
    )?;

    let registry = Arc::new(ConnectionRegistry::new());
    // The concrete protocol backend is linked by the deployment; without one
    // every connect attempt fails and the gateway answers 503.
    let transport: Arc<dyn Transport> = Arc::new(MissingTransport);
    let (connector, inbound) = SessionConnector::new(
        transport,
        Arc::clone(&credential_store) as Arc<dyn CredentialStore>,
        Arc::clone(&registry),
        ConnectorConfig {
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
            max_retry_delay: settings.max_retry_delay_secs.map(Duration::from_secs),
        },
    );
    tokio::spawn(Arc::clone(&connector).run(credentials));
    tokio::spawn(run_relay(
        inbound,
        FilterOptions {
            relay_own_messages: settings.relay_own_messages,
        },
        relay,
    ));

    let state = Arc::new(AppState {
        gateway: GatewayContext { registry },
        api_key: settings.api_key.clone(),
    });
    let app = build_router(state);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "command gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/send-text", post(send_text))
        .route(
            "/send-audio-binary",
            post(send_audio_binary).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/get-profile-pic", post(get_profile_pic))
        .route("/view-status", post(view_status))
        .route("/send-reaction", post(send_reaction))
        .route("/send-image-from-url", post(send_image_from_url))
        .route("/send-presence", post(send_presence))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ))
        .with_state(state)
}

/// Compares the shared secret before any route logic runs. With no secret
/// configured every request is accepted.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("Chave de API inválida.")),
        )
            .into_response()
    }
}

fn error_response(err: CommandError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &err {
        CommandError::Validation(_) => {
            debug!(%err, "request rejected");
            StatusCode::BAD_REQUEST
        }
        CommandError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        CommandError::NotFound(_) => StatusCode::NOT_FOUND,
        CommandError::Transport(_) => {
            error!(%err, "transport call failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorBody::new(err.to_string())))
}

async fn run_send(
    state: &AppState,
    command: OutboundCommand,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    match execute(&state.gateway, command).await.map_err(error_response)? {
        CommandOutcome::Sent { message } => Ok(Json(Ack::with_message(message))),
        CommandOutcome::ProfilePicture { url } => Ok(Json(Ack::with_message(url.to_string()))),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let online = state.gateway.registry.is_ready().await;
    Json(StatusResponse {
        success: true,
        status: if online { "online" } else { "offline" },
    })
}

async fn send_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendTextRequest>,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::SendText {
        to: req.to.unwrap_or_default(),
        text: req.text.unwrap_or_default(),
    };
    run_send(&state, command).await
}

async fn send_audio_binary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AudioQuery>,
    body: Bytes,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::SendMedia {
        to: query.to.unwrap_or_default(),
        media: MediaRequest::Audio {
            bytes: body.to_vec(),
        },
    };
    run_send(&state, command).await
}

async fn get_profile_pic(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TargetRequest>,
) -> Result<Json<ProfilePicResponse>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::FetchProfilePicture {
        to: req.to.unwrap_or_default(),
    };
    match execute(&state.gateway, command).await.map_err(error_response)? {
        CommandOutcome::ProfilePicture { url } => Ok(Json(ProfilePicResponse {
            success: true,
            url: url.to_string(),
        })),
        CommandOutcome::Sent { .. } => Err(error_response(CommandError::NotFound(
            "Foto de perfil não encontrada ou é privada.".to_string(),
        ))),
    }
}

async fn view_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ViewStatusRequest>,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::MarkViewed {
        jid: req.jid.unwrap_or_default(),
    };
    run_send(&state, command).await
}

async fn send_reaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendReactionRequest>,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::SendReaction {
        to: req.to.unwrap_or_default(),
        reaction: req.reaction.unwrap_or_default(),
        key: req.message_key.unwrap_or_default(),
    };
    run_send(&state, command).await
}

async fn send_image_from_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendImageRequest>,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::SendMedia {
        to: req.to.unwrap_or_default(),
        media: MediaRequest::ImageFromUrl {
            url: req.url.unwrap_or_default(),
            caption: req.caption,
        },
    };
    run_send(&state, command).await
}

async fn send_presence(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendPresenceRequest>,
) -> Result<Json<Ack>, (StatusCode, Json<ErrorBody>)> {
    let command = OutboundCommand::SendPresence {
        to: req.to.unwrap_or_default(),
        presence: req.presence.unwrap_or_default(),
    };
    run_send(&state, command).await
}
