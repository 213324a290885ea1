//! Async driver around the [`Controller`].
//!
//! ## Design
//! - One owned `Runtime` per client: controller, notifier, HTTP client and
//!   the socket write half live here and nowhere else
//! - Background tasks (socket reader, timers, HTTP calls) never touch that
//!   state; they post [`Inbound`] messages on one unbounded queue
//! - Every socket gets a generation number; messages from an older socket
//!   are dropped, so a slow reader cannot disturb a fresh connection
//! - The runtime is meant for a current-thread tokio runtime; nothing here
//!   needs `Sync`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::*;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant as TokioInstant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::controller::{CloseReason, Controller, Effect, FailureKind, Msg, SessionOutcome, SessionPhase};
use crate::download;
use crate::error::{EnrichError, UploadError};
use crate::notify::{BannerContainer, Notifier};
use crate::progress;
use crate::protocol::{Ack, ServerEvent, UploadResult, EVENT_START_PROCESSING};
use crate::socketio::{EnginePacket, SocketPacket};
use crate::validate::FormFields;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// Everything background tasks report back to the runtime.
enum Inbound {
    Msg(Msg),
    Opened { generation: u64, sink: WsSink },
    Packet { generation: u64, packet: SocketPacket },
    Ping { generation: u64 },
    Lost { generation: u64, reason: CloseReason },
    AckTimeout { id: u64 },
}

pub struct Runtime {
    config: ClientConfig,
    controller: Controller,
    notifier: Notifier,
    api: Arc<ApiClient>,
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    sink: Option<WsSink>,
    generation: u64,
    next_ack_id: u64,
    awaiting_ack: Option<u64>,
    last_download: Option<PathBuf>,
    last_upload_error: Option<UploadError>,
    rendered: Option<(u8, String)>,
}

impl Runtime {
    pub fn new(config: ClientConfig, container: Box<dyn BannerContainer>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            controller: Controller::new(&config),
            notifier: Notifier::new(container, config.notify_dismiss_after),
            api: Arc::new(ApiClient::new(config.clone())),
            config,
            tx,
            rx,
            sink: None,
            generation: 0,
            next_ack_id: 0,
            awaiting_ack: None,
            last_download: None,
            last_upload_error: None,
            rendered: None,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Open the channel and wait until it is connected or retries run out.
    pub async fn connect(&mut self) -> Result<(), EnrichError> {
        self.spawn_after(self.config.connect_timeout, Msg::ConnectTimeoutElapsed);
        if let Some(outcome) = self.dispatch(Msg::ConnectRequested).await {
            return self.outcome_to_result(outcome).map(|_| ());
        }
        let outcome = self
            .pump(|c| c.is_connected() || c.reconnect_exhausted())
            .await;
        if let Some(outcome) = outcome {
            return self.outcome_to_result(outcome).map(|_| ());
        }
        if self.controller.is_connected() {
            Ok(())
        } else {
            Err(EnrichError::Connection("could not connect to the server".into()))
        }
    }

    /// Upload `path`; on success the processing form is unlocked.
    pub async fn upload(&mut self, path: &Path) -> Result<UploadResult, EnrichError> {
        self.last_upload_error = None;
        let mut outcome = self.dispatch(Msg::UploadRequested(path.to_path_buf())).await;
        if outcome.is_none() && self.controller.phase() == SessionPhase::Uploading {
            outcome = self.pump(|c| c.phase() != SessionPhase::Uploading).await;
        }
        if let Some(outcome) = outcome {
            self.outcome_to_result(outcome)?;
        }
        self.controller
            .upload()
            .cloned()
            .ok_or_else(|| EnrichError::Upload(UploadError::Transport("upload did not complete".into())))
    }

    /// Submit the processing form and wait for the session to settle.
    ///
    /// # Returns
    /// - `Ok(path)`: the result CSV was saved at `path`.
    /// - `Err(EnrichError::Validation)`: nothing was sent.
    /// - `Err(EnrichError::Submission | Processing | Stall | Connection)`: see
    ///   the error variants.
    pub async fn submit(&mut self, fields: FormFields) -> Result<PathBuf, EnrichError> {
        self.last_download = None;
        let mut outcome = self.dispatch(Msg::SubmitRequested(fields)).await;
        if outcome.is_none() {
            if !matches!(self.controller.phase(), SessionPhase::Submitting | SessionPhase::Processing) {
                return Err(EnrichError::Submission("submission was not accepted".into()));
            }
            outcome = self.pump(|_| false).await;
        }
        self.drain().await;
        match outcome {
            Some(outcome) => {
                self.outcome_to_result(outcome)?;
                self.last_download
                    .clone()
                    .ok_or_else(|| EnrichError::Processing("result could not be saved".into()))
            }
            None => Err(EnrichError::Processing("session ended without an outcome".into())),
        }
    }

    /// Fetch the scrape quota over HTTP and show or hide it.
    pub async fn refresh_quota(&mut self) {
        let quota = match self.api.scrape_quota().await {
            Ok(quota) => quota,
            Err(e) => {
                warn!(error = %e, "scrape quota unavailable");
                None
            }
        };
        self.dispatch(Msg::QuotaUpdated(quota)).await;
    }

    /// Close the channel; no reconnection follows.
    pub async fn shutdown(&mut self) {
        self.generation += 1;
        if let Some(mut sink) = self.sink.take() {
            let disconnect = SocketPacket::Disconnect { nsp: "/".into() }.to_frame();
            let _ = sink.send(WsMessage::Text(disconnect)).await;
            let _ = sink.close().await;
        }
        self.dispatch(Msg::ChannelClosed { reason: CloseReason::ClientDisconnect }).await;
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Process inbound messages and timers until `done` holds or a session
    /// outcome is produced.
    async fn pump<F>(&mut self, mut done: F) -> Option<SessionOutcome>
    where
        F: FnMut(&Controller) -> bool,
    {
        let mut watchdog = tokio::time::interval(self.config.stall_check_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);
        watchdog.tick().await;

        loop {
            if done(&self.controller) {
                return None;
            }
            let banner_deadline = self.notifier.next_deadline().map(TokioInstant::from_std);

            tokio::select! {
                Some(inbound) = self.rx.recv() => {
                    if let Some(outcome) = self.on_inbound(inbound).await {
                        return Some(outcome);
                    }
                }
                _ = watchdog.tick() => {
                    if let Some(outcome) = self.dispatch(Msg::WatchdogTick).await {
                        return Some(outcome);
                    }
                }
                _ = sleep_until_opt(banner_deadline) => {
                    self.notifier.expire(std::time::Instant::now());
                }
            }
        }
    }

    /// Handle whatever is already queued without waiting.
    async fn drain(&mut self) {
        while let Ok(inbound) = self.rx.try_recv() {
            self.on_inbound(inbound).await;
        }
    }

    async fn on_inbound(&mut self, inbound: Inbound) -> Option<SessionOutcome> {
        match inbound {
            Inbound::Msg(msg) => self.dispatch(msg).await,
            Inbound::Opened { generation, sink } => {
                if generation == self.generation {
                    self.sink = Some(sink);
                }
                None
            }
            Inbound::Packet { generation, packet } if generation == self.generation => {
                self.on_packet(packet).await
            }
            Inbound::Ping { generation } if generation == self.generation => {
                self.send_frame(EnginePacket::Pong.encode()).await;
                None
            }
            Inbound::Lost { generation, reason } if generation == self.generation => {
                self.sink = None;
                self.dispatch(Msg::ChannelClosed { reason }).await
            }
            Inbound::AckTimeout { id } if self.awaiting_ack == Some(id) => {
                warn!(ack_id = id, "acknowledgment timed out");
                self.awaiting_ack = None;
                self.dispatch(Msg::AckReceived(None)).await
            }
            _ => {
                debug!("stale inbound message dropped");
                None
            }
        }
    }

    async fn on_packet(&mut self, packet: SocketPacket) -> Option<SessionOutcome> {
        match packet {
            SocketPacket::Connect { data, .. } => {
                let sid = data
                    .as_ref()
                    .and_then(|d| d.get("sid"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.dispatch(Msg::ChannelConnected { sid }).await
            }
            SocketPacket::ConnectError { data, .. } => {
                let reason = data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("connection refused")
                    .to_string();
                self.drop_socket().await;
                self.dispatch(Msg::ConnectFailed { reason }).await
            }
            SocketPacket::Disconnect { .. } => {
                self.drop_socket().await;
                self.dispatch(Msg::ChannelClosed { reason: CloseReason::ServerDisconnect }).await
            }
            SocketPacket::Event { name, args, .. } => {
                let data = args.into_iter().next().unwrap_or(Value::Null);
                match ServerEvent::parse(&name, data) {
                    Ok(event) => self.dispatch(Msg::Server(event)).await,
                    Err(e) => {
                        warn!(event = %name, error = %e, "malformed server event ignored");
                        None
                    }
                }
            }
            SocketPacket::Ack { id, args, .. } => {
                if self.awaiting_ack != Some(id) {
                    debug!(ack_id = id, "unexpected acknowledgment ignored");
                    return None;
                }
                self.awaiting_ack = None;
                let ack = args.first().filter(|v| !v.is_null()).map(Ack::from_value);
                self.dispatch(Msg::AckReceived(ack)).await
            }
        }
    }

    /// Feed one message to the controller and carry out its effects.
    async fn dispatch(&mut self, msg: Msg) -> Option<SessionOutcome> {
        if let Msg::UploadFailed(e) = &msg {
            self.last_upload_error = Some(e.clone());
        }
        let effects = self.controller.handle(msg, std::time::Instant::now());
        let mut outcome = None;
        for effect in effects {
            if let Some(o) = self.execute(effect).await {
                outcome = Some(o);
            }
        }
        self.render_view();
        outcome
    }

    async fn execute(&mut self, effect: Effect) -> Option<SessionOutcome> {
        match effect {
            Effect::Notify { kind, message } => {
                self.notifier.notify(&message, kind, std::time::Instant::now());
            }
            Effect::OpenChannel => self.open_channel(),
            Effect::ScheduleReconnect { attempt, delay } => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.spawn_after(delay, Msg::ReconnectTimerFired);
            }
            Effect::StartUpload(path) => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let msg = match api.upload(&path).await {
                        Ok(result) => Msg::UploadSucceeded(result),
                        Err(e) => Msg::UploadFailed(e),
                    };
                    let _ = tx.send(Inbound::Msg(msg));
                });
            }
            Effect::EmitStartProcessing(request) => {
                self.next_ack_id += 1;
                let id = self.next_ack_id;
                let payload = request.to_payload(self.config.model_field);
                let frame = SocketPacket::event(EVENT_START_PROCESSING, payload, Some(id)).to_frame();
                self.awaiting_ack = Some(id);
                if self.send_frame(frame).await {
                    info!(ack_id = id, "start_processing emitted");
                    let tx = self.tx.clone();
                    let timeout = self.config.ack_timeout;
                    tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        let _ = tx.send(Inbound::AckTimeout { id });
                    });
                } else {
                    let _ = self.tx.send(Inbound::AckTimeout { id });
                }
            }
            Effect::PostProcess(request) => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                let field = self.config.model_field;
                tokio::spawn(async move {
                    let result = api.process(&request, field).await.map_err(|e| e.to_string());
                    let _ = tx.send(Inbound::Msg(Msg::HttpProcessFinished(result)));
                });
            }
            Effect::SaveDownload { csv } => {
                let msg = match download::save_download(&self.config.download_dir, &csv).await {
                    Ok(path) => {
                        self.last_download = Some(path.clone());
                        Msg::DownloadSaved(path)
                    }
                    Err(e) => {
                        error!(error = %e, "saving result failed");
                        Msg::DownloadFailed(e.to_string())
                    }
                };
                let _ = self.tx.send(Inbound::Msg(msg));
            }
            Effect::RedirectToLogin { location } => {
                let url = if location.starts_with("http") {
                    location
                } else {
                    self.config.endpoint(&location)
                };
                warn!(login_url = %url, "session expired; log in and refresh the session cookie");
            }
            Effect::Settled(outcome) => return Some(outcome),
        }
        None
    }

    // -----------------------------------------------------------------------
    // Socket plumbing
    // -----------------------------------------------------------------------

    fn open_channel(&mut self) {
        self.generation += 1;
        self.sink = None;
        let generation = self.generation;
        let url = self.config.socket_url();
        let cookie = self.config.session_cookie.clone();
        let handshake_timeout = self.config.connect_timeout;
        let tx = self.tx.clone();
        info!(url = %url, generation, "opening socket");
        tokio::spawn(run_connection(generation, url, cookie, handshake_timeout, tx));
    }

    async fn drop_socket(&mut self) {
        self.generation += 1;
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.close().await;
        }
    }

    /// Send one text frame; `false` when there is no usable socket.
    async fn send_frame(&mut self, frame: String) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            warn!("no open socket to send on");
            return false;
        };
        match sink.send(WsMessage::Text(frame)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "socket send failed");
                false
            }
        }
    }

    fn spawn_after(&self, delay: Duration, msg: Msg) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Inbound::Msg(msg));
        });
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    fn render_view(&mut self) {
        let view = self.controller.view();
        if !view.progress_visible {
            self.rendered = None;
            return;
        }
        let current = (view.progress_percent, view.progress_text.clone());
        if self.rendered.as_ref() == Some(&current) {
            return;
        }
        eprintln!(
            "{} {} {}",
            progress::render_bar(view.progress_percent, 30),
            view.progress_text,
            format!("({})", view.operation_status).bright_black()
        );
        self.rendered = Some(current);
    }

    fn outcome_to_result(&self, outcome: SessionOutcome) -> Result<(), EnrichError> {
        match outcome {
            SessionOutcome::Completed => Ok(()),
            SessionOutcome::Failed { kind, message } => Err(match kind {
                FailureKind::Validation => EnrichError::Validation(self.controller.view().field_errors.clone()),
                FailureKind::Upload => match self.last_upload_error.clone() {
                    Some(e) => EnrichError::Upload(e),
                    None => EnrichError::Upload(UploadError::Transport(message)),
                },
                FailureKind::Connection => EnrichError::Connection(message),
                FailureKind::Submission => EnrichError::Submission(message),
                FailureKind::Processing => EnrichError::Processing(message),
                FailureKind::Stall => EnrichError::Stall { window: self.config.stall_window },
            }),
        }
    }
}

async fn sleep_until_opt(deadline: Option<TokioInstant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// Dial, complete the Engine.IO handshake, hand the write half to the
/// runtime, then forward every packet until the socket ends.
async fn run_connection(
    generation: u64,
    url: String,
    cookie: Option<String>,
    handshake_timeout: Duration,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    let lost = |reason: CloseReason| Inbound::Lost { generation, reason };

    let opened = tokio::time::timeout(handshake_timeout, open_socket(&url, cookie.as_deref())).await;
    let (sink, mut stream, liveness) = match opened {
        Ok(Ok(parts)) => parts,
        Ok(Err(reason)) => {
            let _ = tx.send(lost(CloseReason::TransportError(reason)));
            return;
        }
        Err(_) => {
            let _ = tx.send(lost(CloseReason::TransportError("handshake timed out".into())));
            return;
        }
    };
    if tx.send(Inbound::Opened { generation, sink }).is_err() {
        return;
    }

    loop {
        let next = match liveness {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    let _ = tx.send(lost(CloseReason::TransportError("ping timeout".into())));
                    return;
                }
            },
            None => stream.next().await,
        };

        let inbound = match next {
            Some(Ok(WsMessage::Text(text))) => match EnginePacket::decode(&text) {
                Ok(EnginePacket::Ping) => Inbound::Ping { generation },
                Ok(EnginePacket::Message(body)) => match SocketPacket::decode(&body) {
                    Ok(packet) => Inbound::Packet { generation, packet },
                    Err(e) => {
                        warn!(error = %e, "undecodable socket.io packet");
                        continue;
                    }
                },
                Ok(EnginePacket::Close) => lost(CloseReason::TransportClose),
                Ok(other) => {
                    debug!(packet = ?other, "engine.io packet ignored");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "undecodable engine.io packet");
                    continue;
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => lost(CloseReason::TransportClose),
            Some(Ok(_)) => continue,
            Some(Err(e)) => lost(CloseReason::TransportError(e.to_string())),
        };

        let finished = matches!(inbound, Inbound::Lost { .. });
        if tx.send(inbound).is_err() || finished {
            return;
        }
    }
}

/// Connect, read the Engine.IO `open` packet and request the default
/// namespace. Returns the split socket and the ping liveness window.
async fn open_socket(
    url: &str,
    cookie: Option<&str>,
) -> Result<(WsSink, SplitStream<WsStream>, Option<Duration>), String> {
    let mut request = url.into_client_request().map_err(|e| e.to_string())?;
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(cookie).map_err(|e| e.to_string())?;
        request.headers_mut().insert(COOKIE, value);
    }

    let (ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| e.to_string())?;
    let (mut sink, mut stream) = ws.split();

    let handshake = loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => match EnginePacket::decode(&text) {
                Ok(EnginePacket::Open(handshake)) => break handshake,
                Ok(other) => return Err(format!("expected engine.io open, got {other:?}")),
                Err(e) => return Err(e.to_string()),
            },
            Some(Ok(WsMessage::Close(_))) | None => return Err("closed during handshake".into()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.to_string()),
        }
    };
    debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "engine.io open");

    sink.send(WsMessage::Text(SocketPacket::connect().to_frame()))
        .await
        .map_err(|e| e.to_string())?;

    let liveness = (handshake.ping_interval > 0)
        .then(|| Duration::from_millis(handshake.ping_interval + handshake.ping_timeout));
    Ok((sink, stream, liveness))
}
