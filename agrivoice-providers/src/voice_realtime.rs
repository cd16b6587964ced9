use std::time::Duration;

use agrivoice_core::{
    AssistantId, IncomingMessage, MessageKind, OutboundMessage, Role, SessionEvent,
    VariableValues,
};
use anyhow::{Context, anyhow};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{Message, client::IntoClientRequest};
use url::Url;

const WS_SEND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeVoiceConfig {
    pub ws_url: Url,
    pub public_key: String,
    pub connect_timeout: Duration,
}

impl RealtimeVoiceConfig {
    pub fn new(ws_url: &str, public_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            ws_url: Url::parse(ws_url).context("parse voice websocket url")?,
            public_key: public_key.into(),
            connect_timeout: Duration::from_secs(10),
        })
    }
}

#[derive(Debug)]
enum VoiceCmd {
    Send(OutboundMessage),
    Stop,
}

/// Control side of one live call. Events flow out through the broadcast
/// sender handed to [`connect_voice_call`].
#[derive(Clone)]
pub struct RealtimeVoiceHandle {
    tx: mpsc::Sender<VoiceCmd>,
}

impl RealtimeVoiceHandle {
    pub async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        self.tx
            .send(VoiceCmd::Send(message))
            .await
            .map_err(|_| anyhow!("voice call closed"))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.tx
            .send(VoiceCmd::Stop)
            .await
            .map_err(|_| anyhow!("voice call closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Opens the websocket, asks the service to start `assistant_id`, and spawns
/// the task that turns frames into [`SessionEvent`]s.
///
/// Returning `Ok` means the service accepted the connection; the call itself
/// is live only once a `CallStart` event arrives.
pub async fn connect_voice_call(
    cfg: &RealtimeVoiceConfig,
    assistant_id: &AssistantId,
    variables: &VariableValues,
    events: broadcast::Sender<SessionEvent>,
) -> anyhow::Result<RealtimeVoiceHandle> {
    if cfg.public_key.trim().is_empty() {
        return Err(anyhow!("missing voice public key"));
    }

    let mut req = cfg
        .ws_url
        .as_str()
        .into_client_request()
        .context("build websocket request")?;
    req.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", cfg.public_key.trim())
            .parse()
            .map_err(|_| anyhow!("invalid voice public key header"))?,
    );

    let (ws, _resp) = tokio::time::timeout(cfg.connect_timeout, tokio_tungstenite::connect_async(req))
        .await
        .map_err(|_| anyhow!("voice connect timed out"))?
        .context("connect voice websocket")?;

    let (mut ws_write, mut ws_read) = ws.split();

    let start = build_start_message(assistant_id, variables);
    tokio::time::timeout(WS_SEND_TIMEOUT, ws_write.send(Message::Text(start.into())))
        .await
        .map_err(|_| anyhow!("voice start timed out"))?
        .context("send start message")?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<VoiceCmd>(32);

    tokio::spawn(async move {
        // Exactly one terminal event (CallEnd or Error) per connection.
        let mut finished = false;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    let text = match cmd {
                        VoiceCmd::Send(msg) => match serde_json::to_string(&msg) {
                            Ok(t) => t,
                            Err(e) => {
                                log::error!("encode outbound voice message: {e}");
                                continue;
                            }
                        },
                        VoiceCmd::Stop => {
                            let _ = tokio::time::timeout(
                                WS_SEND_TIMEOUT,
                                ws_write.send(Message::Text(END_CALL_MESSAGE.into())),
                            )
                            .await;
                            break;
                        }
                    };

                    let sent = tokio::time::timeout(WS_SEND_TIMEOUT, ws_write.send(Message::Text(text.into()))).await;
                    if !matches!(sent, Ok(Ok(()))) {
                        let _ = events.send(SessionEvent::Error("voice websocket send failed".into()));
                        finished = true;
                        break;
                    }
                }

                msg = ws_read.next() => {
                    let Some(msg) = msg else { break; };
                    let msg = match msg {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("voice websocket read failed: {e}");
                            let _ = events.send(SessionEvent::Error("voice websocket read failed".into()));
                            finished = true;
                            break;
                        }
                    };

                    let text = match msg {
                        Message::Text(t) => t.to_string(),
                        Message::Binary(b) => String::from_utf8_lossy(&b).to_string(),
                        Message::Close(_) => break,
                        Message::Ping(p) => {
                            let _ = tokio::time::timeout(WS_SEND_TIMEOUT, ws_write.send(Message::Pong(p))).await;
                            continue;
                        }
                        _ => continue,
                    };

                    match parse_voice_frame(&text) {
                        Ok(Some(event)) => {
                            let terminal = matches!(event, SessionEvent::CallEnd | SessionEvent::Error(_));
                            let _ = events.send(event);
                            if terminal {
                                finished = true;
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => log::debug!("ignoring voice frame: {e}"),
                    }
                }
            }
        }

        if !finished {
            let _ = events.send(SessionEvent::CallEnd);
        }

        let _ = ws_write.send(Message::Close(None)).await;
    });

    Ok(RealtimeVoiceHandle { tx: cmd_tx })
}

const END_CALL_MESSAGE: &str = r#"{"type":"end-call"}"#;

fn build_start_message(assistant_id: &AssistantId, variables: &VariableValues) -> String {
    serde_json::json!({
        "type": "start",
        "assistantId": assistant_id.as_str(),
        "assistantOverrides": { "variableValues": variables },
    })
    .to_string()
}

/// Maps one server frame to an event. `Ok(None)` is a frame we know but don't surface
/// (status updates, speech markers, roles we don't track).
fn parse_voice_frame(s: &str) -> anyhow::Result<Option<SessionEvent>> {
    let v: serde_json::Value = serde_json::from_str(s).context("decode voice frame")?;
    let t = v
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("missing type"))?;

    let text_of = |key: &str| v.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();
    let role = match v.get("role").and_then(|v| v.as_str()) {
        Some("assistant") => Some(Role::Assistant),
        Some("user") => Some(Role::User),
        Some("system") => Some(Role::System),
        _ => None,
    };

    match t {
        "call-start" => Ok(Some(SessionEvent::CallStart)),
        "call-end" => Ok(Some(SessionEvent::CallEnd)),
        "error" => {
            let error = text_of("error");
            let error = if error.is_empty() {
                "unknown voice error".to_string()
            } else {
                error
            };
            Ok(Some(SessionEvent::Error(error)))
        }
        "message" | "transcript" => {
            let Some(role) = role else { return Ok(None) };
            let (kind, text) = if t == "message" {
                (MessageKind::Message, text_of("message"))
            } else {
                (MessageKind::Transcript, text_of("transcript"))
            };
            Ok(Some(SessionEvent::Message(IncomingMessage { role, text, kind })))
        }
        "status-update" | "speech-update" | "conversation-update" | "model-output" => Ok(None),
        other => Err(anyhow!("unknown type: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

    const ASSISTANT: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    fn vars() -> VariableValues {
        let mut v = VariableValues::new();
        v.insert("USER_JWT_TOKEN".into(), "jwt".into());
        v
    }

    async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[test]
    fn start_message_carries_assistant_and_variables() {
        let id = AssistantId::parse(ASSISTANT).unwrap();
        let v: serde_json::Value = serde_json::from_str(&build_start_message(&id, &vars())).unwrap();
        assert_eq!(v["type"], "start");
        assert_eq!(v["assistantId"], ASSISTANT);
        assert_eq!(v["assistantOverrides"]["variableValues"]["USER_JWT_TOKEN"], "jwt");
    }

    #[test]
    fn parses_lifecycle_and_messages() {
        assert_eq!(
            parse_voice_frame(r#"{"type":"call-start"}"#).unwrap(),
            Some(SessionEvent::CallStart)
        );
        assert_eq!(
            parse_voice_frame(r#"{"type":"call-end"}"#).unwrap(),
            Some(SessionEvent::CallEnd)
        );
        assert_eq!(
            parse_voice_frame(r#"{"type":"message","role":"assistant","message":"hi"}"#).unwrap(),
            Some(SessionEvent::Message(IncomingMessage::assistant("hi")))
        );
        assert_eq!(
            parse_voice_frame(r#"{"type":"transcript","role":"user","transcript":"hel"}"#).unwrap(),
            Some(SessionEvent::Message(IncomingMessage {
                role: Role::User,
                text: "hel".into(),
                kind: MessageKind::Transcript,
            }))
        );
    }

    #[test]
    fn error_without_detail_gets_placeholder() {
        assert_eq!(
            parse_voice_frame(r#"{"type":"error"}"#).unwrap(),
            Some(SessionEvent::Error("unknown voice error".into()))
        );
    }

    #[test]
    fn known_noise_is_skipped_and_unknown_rejected() {
        assert_eq!(parse_voice_frame(r#"{"type":"speech-update"}"#).unwrap(), None);
        assert_eq!(
            parse_voice_frame(r#"{"type":"message","role":"tool","message":"x"}"#).unwrap(),
            None
        );
        assert!(parse_voice_frame(r#"{"type":"bogus"}"#).is_err());
        assert!(parse_voice_frame(r#"{"role":"assistant"}"#).is_err());
    }

    #[tokio::test]
    async fn integration_call_flow_relays_events_and_sends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let auth_tx = seen_tx.clone();
            let mut ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
                let auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let _ = auth_tx.send(auth);
                Ok(resp)
            })
            .await
            .unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(txt) = msg else { continue };
                let txt = txt.to_string();
                let _ = seen_tx.send(txt.clone());
                if txt.contains("\"type\":\"start\"") {
                    let _ = ws.send(Message::Text(r#"{"type":"call-start"}"#.into())).await;
                    let _ = ws
                        .send(Message::Text(
                            r#"{"type":"message","role":"assistant","message":"Please upload an image of the leaf"}"#.into(),
                        ))
                        .await;
                } else if txt.contains("end-call") {
                    break;
                }
            }
        });

        let cfg = RealtimeVoiceConfig::new(&format!("ws://{addr}/call"), "pk").unwrap();
        let (events_tx, mut events) = broadcast::channel(16);
        let id = AssistantId::parse(ASSISTANT).unwrap();
        let handle = connect_voice_call(&cfg, &id, &vars(), events_tx).await.unwrap();

        assert_eq!(seen_rx.recv().await.unwrap(), "Bearer pk");
        assert!(seen_rx.recv().await.unwrap().contains(ASSISTANT));

        assert_eq!(next_event(&mut events).await, SessionEvent::CallStart);
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Message(IncomingMessage::assistant("Please upload an image of the leaf"))
        );

        handle
            .send(OutboundMessage::synthetic_user("The analysis is complete."))
            .await
            .unwrap();
        let sent: serde_json::Value = serde_json::from_str(&seen_rx.recv().await.unwrap()).unwrap();
        assert_eq!(sent["type"], "add-message");
        assert_eq!(sent["message"]["role"], "user");

        handle.stop().await.unwrap();
        assert!(seen_rx.recv().await.unwrap().contains("end-call"));
        assert_eq!(next_event(&mut events).await, SessionEvent::CallEnd);
    }

    #[tokio::test]
    async fn integration_server_hangup_emits_single_call_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.next().await; // start
            let _ = ws.send(Message::Text(r#"{"type":"call-start"}"#.into())).await;
            let _ = ws.send(Message::Text(r#"{"type":"call-end"}"#.into())).await;
            let _ = ws.close(None).await;
        });

        let cfg = RealtimeVoiceConfig::new(&format!("ws://{addr}/call"), "pk").unwrap();
        let (events_tx, mut events) = broadcast::channel(16);
        let id = AssistantId::parse(ASSISTANT).unwrap();
        let handle = connect_voice_call(&cfg, &id, &vars(), events_tx).await.unwrap();

        assert_eq!(next_event(&mut events).await, SessionEvent::CallStart);
        assert_eq!(next_event(&mut events).await, SessionEvent::CallEnd);

        // The reader task exits after the terminal event; nothing else follows.
        let extra = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(!matches!(extra, Ok(Ok(_))));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn blank_public_key_is_rejected_before_connecting() {
        let cfg = RealtimeVoiceConfig::new("ws://127.0.0.1:9/call", " ").unwrap();
        let (events_tx, _events) = broadcast::channel(4);
        let id = AssistantId::parse(ASSISTANT).unwrap();
        let err = connect_voice_call(&cfg, &id, &vars(), events_tx).await.err().unwrap();
        assert!(err.to_string().contains("public key"));
    }
}
