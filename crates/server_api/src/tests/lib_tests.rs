use std::sync::Mutex;

use async_trait::async_trait;

use super::*;

#[derive(Debug, Clone, PartialEq)]
enum RecordedCall {
    Text {
        to: Jid,
        text: String,
    },
    Media {
        to: Jid,
        media: MediaPayload,
    },
    Reaction {
        to: Jid,
        key: MessageKey,
        reaction: String,
    },
    Presence {
        to: Jid,
        presence: Presence,
    },
    Read {
        keys: Vec<MessageKey>,
    },
    ProfilePicture {
        jid: Jid,
    },
}

#[derive(Default)]
struct RecordingHandle {
    calls: Mutex<Vec<RecordedCall>>,
    picture: Option<Url>,
    fail: bool,
}

impl RecordingHandle {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn with_picture(url: Url) -> Self {
        Self {
            picture: Some(url),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: RecordedCall) -> Result<(), TransportError> {
        self.calls.lock().expect("calls lock").push(call);
        if self.fail {
            Err(TransportError::Protocol("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionHandle for RecordingHandle {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<(), TransportError> {
        self.record(RecordedCall::Text {
            to: to.clone(),
            text: text.to_string(),
        })
    }

    async fn send_media(&self, to: &Jid, media: MediaPayload) -> Result<(), TransportError> {
        self.record(RecordedCall::Media {
            to: to.clone(),
            media,
        })
    }

    async fn send_reaction(
        &self,
        to: &Jid,
        key: MessageKey,
        reaction: &str,
    ) -> Result<(), TransportError> {
        self.record(RecordedCall::Reaction {
            to: to.clone(),
            key,
            reaction: reaction.to_string(),
        })
    }

    async fn send_presence(&self, to: &Jid, presence: Presence) -> Result<(), TransportError> {
        self.record(RecordedCall::Presence {
            to: to.clone(),
            presence,
        })
    }

    async fn read_messages(&self, keys: Vec<MessageKey>) -> Result<(), TransportError> {
        self.record(RecordedCall::Read { keys })
    }

    async fn profile_picture_url(&self, jid: &Jid) -> Result<Option<Url>, TransportError> {
        self.record(RecordedCall::ProfilePicture { jid: jid.clone() })?;
        Ok(self.picture.clone())
    }
}

async fn ready_ctx(handle: Arc<RecordingHandle>) -> GatewayContext {
    let registry = Arc::new(ConnectionRegistry::new());
    registry.set(Some(handle as Arc<dyn SessionHandle>)).await;
    GatewayContext { registry }
}

fn offline_ctx() -> GatewayContext {
    GatewayContext {
        registry: Arc::new(ConnectionRegistry::new()),
    }
}

#[tokio::test]
async fn malformed_commands_are_rejected_before_any_transport_call() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    let malformed = vec![
        OutboundCommand::SendText {
            to: String::new(),
            text: "hi".to_string(),
        },
        OutboundCommand::SendText {
            to: "5511999998888".to_string(),
            text: String::new(),
        },
        OutboundCommand::SendMedia {
            to: String::new(),
            media: MediaRequest::Audio {
                bytes: vec![1, 2, 3],
            },
        },
        OutboundCommand::SendMedia {
            to: "5511999998888".to_string(),
            media: MediaRequest::Audio { bytes: Vec::new() },
        },
        OutboundCommand::SendMedia {
            to: "5511999998888".to_string(),
            media: MediaRequest::ImageFromUrl {
                url: "not a url".to_string(),
                caption: None,
            },
        },
        OutboundCommand::SendReaction {
            to: "5511999998888".to_string(),
            reaction: "👍".to_string(),
            key: MessageKey::default(),
        },
        OutboundCommand::SendPresence {
            to: "5511999998888".to_string(),
            presence: "typing-hard".to_string(),
        },
        OutboundCommand::MarkViewed {
            jid: "5511999998888".to_string(),
        },
        OutboundCommand::FetchProfilePicture { to: String::new() },
    ];

    for command in malformed {
        let err = execute(&ctx, command.clone())
            .await
            .expect_err("must be rejected");
        assert!(
            matches!(err, CommandError::Validation(_)),
            "{command:?} produced {err:?}"
        );
    }
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn commands_without_a_registered_handle_fail_with_not_connected() {
    let err = execute(
        &offline_ctx(),
        OutboundCommand::SendText {
            to: "5511999998888".to_string(),
            text: "hi".to_string(),
        },
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, CommandError::NotConnected));
    assert_eq!(err.to_string(), "Bot não está pronto ou conectado.");
}

#[tokio::test]
async fn validation_runs_before_the_connection_state_check() {
    let err = execute(
        &offline_ctx(),
        OutboundCommand::SendText {
            to: String::new(),
            text: String::new(),
        },
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, CommandError::Validation(_)));
}

#[tokio::test]
async fn send_text_normalizes_a_bare_number() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    let outcome = execute(
        &ctx,
        OutboundCommand::SendText {
            to: "5511999998888".to_string(),
            text: "hi".to_string(),
        },
    )
    .await
    .expect("sent");

    assert_eq!(outcome, CommandOutcome::sent("Mensagem de texto enviada."));
    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Text {
            to: Jid::new("5511999998888@s.whatsapp.net"),
            text: "hi".to_string(),
        }]
    );
}

#[tokio::test]
async fn send_text_keeps_an_already_canonical_target() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    execute(
        &ctx,
        OutboundCommand::SendText {
            to: "5511999998888@s.whatsapp.net".to_string(),
            text: "hi".to_string(),
        },
    )
    .await
    .expect("sent");

    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Text {
            to: Jid::new("5511999998888@s.whatsapp.net"),
            text: "hi".to_string(),
        }]
    );
}

#[tokio::test]
async fn audio_is_sent_as_a_voice_note() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    execute(
        &ctx,
        OutboundCommand::SendMedia {
            to: "5511999998888".to_string(),
            media: MediaRequest::Audio {
                bytes: vec![0xff, 0xfb, 0x90],
            },
        },
    )
    .await
    .expect("sent");

    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Media {
            to: Jid::new("5511999998888@s.whatsapp.net"),
            media: MediaPayload::Audio {
                bytes: vec![0xff, 0xfb, 0x90],
                voice_note: true,
            },
        }]
    );
}

#[tokio::test]
async fn oversized_audio_is_rejected() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    let err = execute(
        &ctx,
        OutboundCommand::SendMedia {
            to: "5511999998888".to_string(),
            media: MediaRequest::Audio {
                bytes: vec![0; MAX_AUDIO_BYTES + 1],
            },
        },
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, CommandError::Validation(_)));
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn image_from_url_carries_the_optional_caption() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    execute(
        &ctx,
        OutboundCommand::SendMedia {
            to: "5511999998888".to_string(),
            media: MediaRequest::ImageFromUrl {
                url: "https://example.com/cat.jpg".to_string(),
                caption: Some("gato".to_string()),
            },
        },
    )
    .await
    .expect("sent");

    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Media {
            to: Jid::new("5511999998888@s.whatsapp.net"),
            media: MediaPayload::Image {
                url: Url::parse("https://example.com/cat.jpg").expect("url"),
                caption: "gato".to_string(),
            },
        }]
    );
}

#[tokio::test]
async fn reaction_forwards_the_original_message_key() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;
    let key = MessageKey {
        remote_jid: Some(Jid::new("5511999998888@s.whatsapp.net")),
        from_me: false,
        id: "3EB0ABCDEF".to_string(),
        participant: None,
    };

    execute(
        &ctx,
        OutboundCommand::SendReaction {
            to: "5511999998888".to_string(),
            reaction: "👍".to_string(),
            key: key.clone(),
        },
    )
    .await
    .expect("sent");

    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Reaction {
            to: Jid::new("5511999998888@s.whatsapp.net"),
            key,
            reaction: "👍".to_string(),
        }]
    );
}

#[tokio::test]
async fn presence_is_parsed_and_dispatched() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    let outcome = execute(
        &ctx,
        OutboundCommand::SendPresence {
            to: "5511999998888".to_string(),
            presence: "composing".to_string(),
        },
    )
    .await
    .expect("sent");

    assert_eq!(
        outcome,
        CommandOutcome::sent("Status 'composing' enviado para o chat 5511999998888.")
    );
    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Presence {
            to: Jid::new("5511999998888@s.whatsapp.net"),
            presence: Presence::Composing,
        }]
    );
}

#[tokio::test]
async fn mark_viewed_builds_a_per_poster_story_receipt() {
    let handle = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(Arc::clone(&handle)).await;

    execute(
        &ctx,
        OutboundCommand::MarkViewed {
            jid: "5511999998888@s.whatsapp.net".to_string(),
        },
    )
    .await
    .expect("sent");

    assert_eq!(
        handle.calls(),
        vec![RecordedCall::Read {
            keys: vec![MessageKey {
                remote_jid: Some(Jid::status_broadcast()),
                from_me: false,
                id: String::new(),
                participant: Some(Jid::new("5511999998888@s.whatsapp.net")),
            }],
        }]
    );
}

#[tokio::test]
async fn profile_picture_present_and_absent() {
    let url = Url::parse("https://pps.whatsapp.net/v/abc.jpg").expect("url");
    let handle = Arc::new(RecordingHandle::with_picture(url.clone()));
    let ctx = ready_ctx(handle).await;
    let outcome = execute(
        &ctx,
        OutboundCommand::FetchProfilePicture {
            to: "5511999998888".to_string(),
        },
    )
    .await
    .expect("found");
    assert_eq!(outcome, CommandOutcome::ProfilePicture { url });

    let absent = Arc::new(RecordingHandle::default());
    let ctx = ready_ctx(absent).await;
    let err = execute(
        &ctx,
        OutboundCommand::FetchProfilePicture {
            to: "5511999998888".to_string(),
        },
    )
    .await
    .expect_err("absent");
    assert!(matches!(err, CommandError::NotFound(_)));
}

#[tokio::test]
async fn transport_failures_surface_as_transport_errors() {
    let handle = Arc::new(RecordingHandle::failing());
    let ctx = ready_ctx(handle).await;

    let err = execute(
        &ctx,
        OutboundCommand::SendText {
            to: "5511999998888".to_string(),
            text: "hi".to_string(),
        },
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, CommandError::Transport(_)));
}
