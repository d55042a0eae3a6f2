// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Session connections opened through the control-plane server.
//!
//! `POST /execute/ws` asks the server to dial the upstream socket; the session
//! is then observed and driven over a second socket at the returned
//! `downstreamPath`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use futures::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use treq_api::{
    ControlMessage, ErrorBody, ExecuteWsRequest, ExecuteWsResponse, PayloadType, ServerEnvelope,
};
use treq_core::error::Result as SessionResult;
use treq_core::{async_trait, ConnectedSession, SessionConnection, SessionError, SessionInfo};
use url::Url;

use crate::plan::{ExecutionPlan, Source};

pub const EXECUTE_WS_PATH: &str = "/execute/ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type EnvelopeItem = Result<ServerEnvelope, SessionError>;

/// Normalizes the server URL to its http(s) origin.
///
/// # Errors
///
/// Returns an error if the URL does not parse or uses an unsupported scheme.
pub fn http_base_url(server_url: &str) -> anyhow::Result<Url> {
    let mut url =
        Url::parse(server_url).with_context(|| format!("Invalid server URL '{server_url}'"))?;
    match url.scheme() {
        "http" | "https" => {},
        "ws" => url
            .set_scheme("http")
            .map_err(|()| anyhow!("Failed to convert ws:// to http:// for server URL"))?,
        "wss" => url
            .set_scheme("https")
            .map_err(|()| anyhow!("Failed to convert wss:// to https:// for server URL"))?,
        _ => bail!("Server URL must be http(s) or ws(s)"),
    }
    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Resolves the downstream socket URL against the server origin.
///
/// # Errors
///
/// Returns an error if the path cannot be joined or the scheme cannot be converted.
pub fn session_ws_url(base: &Url, downstream_path: &str) -> anyhow::Result<Url> {
    let mut ws_url = base
        .join(downstream_path)
        .with_context(|| format!("Invalid downstream path '{downstream_path}'"))?;
    match ws_url.scheme() {
        "http" => ws_url
            .set_scheme("ws")
            .map_err(|()| anyhow!("Failed to convert http:// to ws:// for session URL"))?,
        "https" => ws_url
            .set_scheme("wss")
            .map_err(|()| anyhow!("Failed to convert https:// to wss:// for session URL"))?,
        "ws" | "wss" => {},
        other => bail!("Unsupported session URL scheme '{other}'"),
    }
    Ok(ws_url)
}

fn bearer(token: &str) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}")).context("Token is not a valid header value")
}

/// HTTP + WebSocket client for one control-plane server.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl ControlPlaneClient {
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the HTTP client cannot be built.
    pub fn new(
        server_url: &str,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let base = http_base_url(server_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { http, base, token, timeout })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Creates the session and connects its downstream socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the request file cannot be read, the server rejects
    /// the request, or the downstream socket cannot be opened in time.
    pub async fn connect(&self, plan: &ExecutionPlan) -> anyhow::Result<ConnectedSession> {
        let mut request = plan.request.clone();
        if plan.source == Source::File {
            let content = tokio::fs::read_to_string(&plan.target)
                .await
                .with_context(|| format!("Failed to read {}", plan.target))?;
            request.content = Some(content);
        }

        let created = self.execute(&request).await?;
        info!(session_id = %created.ws_session_id, url = %created.url, "Session created");

        let ws_url = session_ws_url(&self.base, &created.downstream_path)?;
        let ws_stream = self.open_socket(&ws_url).await?;
        let (write, read) = ws_stream.split();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (envelope_tx, envelope_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_frames(write, command_rx));
        let reader = tokio::spawn(read_envelopes(read, envelope_tx));

        Ok(ConnectedSession {
            info: SessionInfo {
                url: created.url,
                session_id: created.ws_session_id,
                subprotocol: created.subprotocol,
            },
            connection: Arc::new(ControlPlaneConnection {
                commands: command_tx,
                reader: reader.abort_handle(),
            }),
            envelopes: UnboundedReceiverStream::new(envelope_rx).boxed(),
        })
    }

    async fn execute(&self, request: &ExecuteWsRequest) -> anyhow::Result<ExecuteWsResponse> {
        let url = self.base.join(EXECUTE_WS_PATH).context("Invalid server URL")?;
        debug!(%url, "Creating WebSocket session");

        let mut http_request = self.http.post(url).json(request);
        if let Some(token) = &self.token {
            http_request = http_request.bearer_auth(token);
        }
        let response = http_request
            .send()
            .await
            .with_context(|| format!("Failed to reach server at {}", self.base))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| match body.code {
                    Some(code) => format!("{code}: {}", body.message),
                    None => body.message,
                })
                .unwrap_or(text);
            bail!("Server returned {status}: {message}");
        }

        response.json().await.context("Failed to parse session response")
    }

    async fn open_socket(&self, ws_url: &Url) -> anyhow::Result<WsStream> {
        let mut ws_request =
            ws_url.as_str().into_client_request().context("Invalid session socket URL")?;
        if let Some(token) = &self.token {
            ws_request.headers_mut().insert(AUTHORIZATION, bearer(token)?);
        }

        debug!(url = %ws_url, "Connecting session socket");
        let connect = connect_async(ws_request);
        let (ws_stream, _) = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect).await.map_err(|_| {
                anyhow!("Timed out connecting to {ws_url} after {}ms", timeout.as_millis())
            })?,
            None => connect.await,
        }
        .with_context(|| format!("Failed to connect to {ws_url}"))?;
        Ok(ws_stream)
    }
}

#[derive(Debug)]
enum WriterCommand {
    Frame(ControlMessage),
    Disconnect { code: u16, reason: String },
}

async fn write_frames(
    mut sink: SplitSink<WsStream, Message>,
    mut commands: mpsc::UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Frame(message) => {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode control message");
                        continue;
                    },
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "Failed to write to session socket");
                    break;
                }
            },
            WriterCommand::Disconnect { code, reason } => {
                let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "Failed to send close frame");
                }
                break;
            },
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "Session socket writer closed with error");
    }
}

async fn read_envelopes(
    mut stream: SplitStream<WsStream>,
    envelopes: mpsc::UnboundedSender<EnvelopeItem>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEnvelope>(&text) {
                Ok(envelope) => {
                    if envelopes.send(Ok(envelope)).is_err() {
                        return;
                    }
                },
                Err(e) => warn!(error = %e, "Skipping malformed envelope"),
            },
            Ok(Message::Close(frame)) => {
                debug!(?frame, "Session socket closed by server");
                return;
            },
            Ok(_) => {},
            Err(e) => {
                let _ = envelopes.send(Err(SessionError::Transport(e.to_string())));
                return;
            },
        }
    }
}

/// [`SessionConnection`] over the downstream socket.
pub struct ControlPlaneConnection {
    commands: mpsc::UnboundedSender<WriterCommand>,
    reader: AbortHandle,
}

impl ControlPlaneConnection {
    fn submit(&self, message: ControlMessage) -> SessionResult<()> {
        self.commands.send(WriterCommand::Frame(message)).map_err(|_| SessionError::NotConnected)
    }
}

#[async_trait]
impl SessionConnection for ControlPlaneConnection {
    async fn send_text(&self, text: &str) -> SessionResult<()> {
        self.submit(ControlMessage::Send {
            payload_type: PayloadType::Text,
            payload: Value::String(text.to_string()),
        })
    }

    async fn send_json(&self, payload: &Value) -> SessionResult<()> {
        self.submit(ControlMessage::Send {
            payload_type: PayloadType::Json,
            payload: payload.clone(),
        })
    }

    async fn ping(&self) -> SessionResult<()> {
        self.submit(ControlMessage::Ping)
    }

    async fn close(&self, code: u16, reason: &str) -> SessionResult<()> {
        self.submit(ControlMessage::Close { code, reason: reason.to_string() })
    }

    async fn disconnect(&self, code: u16, reason: &str) -> SessionResult<()> {
        // Ending the reader drops the envelope sender, which ends the stream.
        self.reader.abort();
        self.commands
            .send(WriterCommand::Disconnect { code, reason: reason.to_string() })
            .map_err(|_| SessionError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn base_url_accepts_ws_schemes_and_strips_path() {
        let base = http_base_url("ws://127.0.0.1:4096/x?y").unwrap();
        assert_eq!(base.as_str(), "http://127.0.0.1:4096/");
        let base = http_base_url("https://treq.example").unwrap();
        assert_eq!(base.as_str(), "https://treq.example/");
        assert!(http_base_url("ftp://treq.example").is_err());
    }

    #[test]
    fn session_url_follows_base_scheme() {
        let base = http_base_url("http://127.0.0.1:4096").unwrap();
        assert_eq!(
            session_ws_url(&base, "/ws/session/ws_1").unwrap().as_str(),
            "ws://127.0.0.1:4096/ws/session/ws_1"
        );

        let base = http_base_url("https://treq.example").unwrap();
        assert_eq!(
            session_ws_url(&base, "/ws/session/ws_1?resume=4").unwrap().as_str(),
            "wss://treq.example/ws/session/ws_1?resume=4"
        );
    }
}
