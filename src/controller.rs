//! # Connection/progress controller
//!
//! ## Responsibility
//! Owns the connection state, the single processing session and the view
//! model. It is a pure state machine: [`Controller::handle`] applies one
//! [`Msg`] at a caller-supplied instant and returns the [`Effect`]s the
//! runtime must carry out (open a socket, emit an event, show a banner,
//! save a download). Nothing here touches the network, the filesystem or a
//! clock.
//!
//! ## Guarantees
//! - At most one session in flight; a second submit is rejected
//! - Reconnection is bounded by `max_reconnect_attempts`; once exhausted the
//!   controller stays `Disconnected` for good
//! - Every failure path ends in a view reset, except a stall, which leaves
//!   the session open so a late result is still delivered
//! - A dropped socket abandons only an in-flight session; an upload or a
//!   configured form is kept for the next connection
//!
//! ## NOT Responsible For
//! - Socket framing and timers (runtime)
//! - HTTP requests (api)

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ReconnectPolicy, SubmitMode};
use crate::error::UploadError;
use crate::notify::NotificationKind;
use crate::progress;
use crate::protocol::{Ack, ProcessingRequest, ProgressEvent, ScrapeQuota, ServerEvent, UploadResult};
use crate::validate::{build_request, FieldError, FormFields, ValidationRules};
use crate::watchdog::StallWatchdog;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "Reconnecting... ({attempt})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Uploading,
    /// Upload done, waiting for the processing form.
    Configuring,
    /// Request sent, acknowledgment pending.
    Submitting,
    Processing,
}

impl SessionPhase {
    fn in_flight(self) -> bool {
        matches!(self, SessionPhase::Submitting | SessionPhase::Processing)
    }
}

/// Why the channel closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server sent a Socket.IO disconnect.
    ServerDisconnect,
    /// The transport ended (close frame, EOF, ping timeout).
    TransportClose,
    TransportError(String),
    /// The client closed the channel itself; never retried.
    ClientDisconnect,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ServerDisconnect => write!(f, "io server disconnect"),
            CloseReason::TransportClose => write!(f, "transport close"),
            CloseReason::TransportError(e) => write!(f, "transport error: {e}"),
            CloseReason::ClientDisconnect => write!(f, "io client disconnect"),
        }
    }
}

// ---------------------------------------------------------------------------
// Messages and effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    ConnectRequested,
    ChannelConnected { sid: Option<String> },
    ConnectFailed { reason: String },
    ChannelClosed { reason: CloseReason },
    /// The initial connect window has passed.
    ConnectTimeoutElapsed,
    ReconnectTimerFired,
    UploadRequested(PathBuf),
    UploadSucceeded(UploadResult),
    UploadFailed(UploadError),
    SubmitRequested(FormFields),
    /// `None` when the acknowledgment never arrived.
    AckReceived(Option<Ack>),
    /// Result of the `POST /process` variant: CSV body or error text.
    HttpProcessFinished(Result<String, String>),
    Server(ServerEvent),
    WatchdogTick,
    DownloadSaved(PathBuf),
    DownloadFailed(String),
    QuotaUpdated(Option<ScrapeQuota>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Upload,
    Connection,
    Submission,
    Processing,
    Stall,
}

/// How one upload/submit cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify { kind: NotificationKind, message: String },
    OpenChannel,
    ScheduleReconnect { attempt: u32, delay: Duration },
    StartUpload(PathBuf),
    EmitStartProcessing(ProcessingRequest),
    PostProcess(ProcessingRequest),
    SaveDownload { csv: String },
    RedirectToLogin { location: String },
    Settled(SessionOutcome),
}

fn notify(kind: NotificationKind, message: impl Into<String>) -> Effect {
    Effect::Notify { kind, message: message.into() }
}

fn failed(kind: FailureKind, message: impl Into<String>) -> Effect {
    Effect::Settled(SessionOutcome::Failed { kind, message: message.into() })
}

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

pub const UPLOAD_LABEL: &str = "Upload & Configure";
pub const UPLOADING_LABEL: &str = "Uploading...";
pub const SUBMIT_LABEL: &str = "Start Processing";
pub const SUBMITTING_LABEL: &str = "Processing...";

/// Everything a front end needs to draw the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub socket_status: String,
    pub upload_enabled: bool,
    pub upload_label: String,
    pub config_visible: bool,
    pub file_info: Option<String>,
    pub submit_enabled: bool,
    pub submit_label: String,
    pub progress_visible: bool,
    pub progress_percent: u8,
    pub progress_text: String,
    pub operation_status: String,
    pub last_progress_at: Option<Instant>,
    pub field_errors: Vec<FieldError>,
    pub quota: Option<ScrapeQuota>,
}

impl ViewState {
    fn baseline(socket_status: String, quota: Option<ScrapeQuota>) -> Self {
        Self {
            socket_status,
            upload_enabled: true,
            upload_label: UPLOAD_LABEL.to_string(),
            config_visible: false,
            file_info: None,
            submit_enabled: true,
            submit_label: SUBMIT_LABEL.to_string(),
            progress_visible: false,
            progress_percent: 0,
            progress_text: String::new(),
            operation_status: String::new(),
            last_progress_at: None,
            field_errors: Vec::new(),
            quota,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller {
    connection: ConnectionState,
    reconnect_attempts: u32,
    reconnect_exhausted: bool,
    connect_reported: bool,
    max_reconnect_attempts: u32,
    reconnect: ReconnectPolicy,
    submit_mode: SubmitMode,
    rules: ValidationRules,
    phase: SessionPhase,
    upload: Option<UploadResult>,
    watchdog: StallWatchdog,
    view: ViewState,
}

impl Controller {
    pub fn new(config: &ClientConfig) -> Self {
        let connection = ConnectionState::Disconnected;
        Self {
            connection,
            reconnect_attempts: 0,
            reconnect_exhausted: false,
            connect_reported: false,
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect: config.reconnect.clone(),
            submit_mode: config.submit_mode,
            rules: ValidationRules { row_limit: config.row_limit_policy },
            phase: SessionPhase::Idle,
            upload: None,
            watchdog: StallWatchdog::new(config.stall_window),
            view: ViewState::baseline(connection.to_string(), None),
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Retries are used up; only a restart brings the channel back.
    pub fn reconnect_exhausted(&self) -> bool {
        self.reconnect_exhausted
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn upload(&self) -> Option<&UploadResult> {
        self.upload.as_ref()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn watchdog_armed(&self) -> bool {
        self.watchdog.is_armed()
    }

    /// Apply `msg` observed at `now`.
    pub fn handle(&mut self, msg: Msg, now: Instant) -> Vec<Effect> {
        let effects = match msg {
            Msg::ConnectRequested => self.on_connect_requested(),
            Msg::ChannelConnected { sid } => self.on_connected(sid),
            Msg::ConnectFailed { reason } => self.on_connect_failed(reason),
            Msg::ChannelClosed { reason } => self.on_closed(reason),
            Msg::ConnectTimeoutElapsed => self.on_connect_timeout(),
            Msg::ReconnectTimerFired => self.on_reconnect_timer(),
            Msg::UploadRequested(path) => self.on_upload_requested(path),
            Msg::UploadSucceeded(result) => self.on_upload_succeeded(result),
            Msg::UploadFailed(error) => self.on_upload_failed(error),
            Msg::SubmitRequested(fields) => self.on_submit(fields, now),
            Msg::AckReceived(ack) => self.on_ack(ack, now),
            Msg::HttpProcessFinished(result) => self.on_http_finished(result),
            Msg::Server(event) => self.on_server_event(event, now),
            Msg::WatchdogTick => self.on_watchdog_tick(now),
            Msg::DownloadSaved(path) => {
                vec![notify(NotificationKind::Success, format!("Results saved to {}", path.display()))]
            }
            Msg::DownloadFailed(reason) => {
                vec![notify(NotificationKind::Error, format!("Could not save results: {reason}"))]
            }
            Msg::QuotaUpdated(quota) => {
                self.view.quota = quota;
                Vec::new()
            }
        };
        self.view.socket_status = self.connection.to_string();
        effects
    }

    // -- connection ---------------------------------------------------------

    fn on_connect_requested(&mut self) -> Vec<Effect> {
        if self.reconnect_exhausted {
            warn!("connect requested after reconnection was exhausted; restart required");
            return Vec::new();
        }
        match self.connection {
            ConnectionState::Disconnected => {
                self.connection = ConnectionState::Connecting;
                vec![Effect::OpenChannel]
            }
            _ => Vec::new(),
        }
    }

    fn on_connected(&mut self, sid: Option<String>) -> Vec<Effect> {
        info!(sid = sid.as_deref().unwrap_or("-"), "socket connected");
        self.connection = ConnectionState::Connected;
        self.reconnect_attempts = 0;
        self.connect_reported = true;
        vec![notify(NotificationKind::Success, "Connected to server.")]
    }

    fn on_connect_failed(&mut self, reason: String) -> Vec<Effect> {
        if self.reconnect_exhausted {
            return Vec::new();
        }
        warn!(reason = %reason, attempts = self.reconnect_attempts, "socket connection error");
        let mut effects = Vec::new();
        if self.connection == ConnectionState::Connecting {
            effects.push(notify(
                NotificationKind::Error,
                "Unable to connect to the server. Please try again later.",
            ));
        }
        effects.extend(self.retry_or_give_up());
        effects
    }

    fn on_closed(&mut self, reason: CloseReason) -> Vec<Effect> {
        info!(reason = %reason, "socket disconnected");
        let was_connected = self.is_connected();

        if reason == CloseReason::ClientDisconnect {
            self.connection = ConnectionState::Disconnected;
            return Vec::new();
        }
        if self.reconnect_exhausted {
            return Vec::new();
        }
        if !was_connected {
            // Closed mid-handshake counts as a failed attempt.
            return self.on_connect_failed(reason.to_string());
        }

        let mut effects = vec![notify(NotificationKind::Error, "Disconnected from server.")];
        // Uploads and a configured form travel over HTTP and outlive the socket.
        if self.phase.in_flight() {
            effects.push(failed(
                FailureKind::Connection,
                format!("connection lost during processing ({reason})"),
            ));
            self.reset();
        }
        effects.extend(self.retry_or_give_up());
        effects
    }

    fn retry_or_give_up(&mut self) -> Vec<Effect> {
        if self.reconnect_attempts < self.max_reconnect_attempts {
            self.reconnect_attempts += 1;
            let attempt = self.reconnect_attempts;
            self.connection = ConnectionState::Reconnecting { attempt };
            let delay = self.reconnect.delay_for(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            return vec![
                notify(
                    NotificationKind::Warning,
                    format!("Reconnection attempt {attempt} of {}...", self.max_reconnect_attempts),
                ),
                Effect::ScheduleReconnect { attempt, delay },
            ];
        }

        self.connection = ConnectionState::Disconnected;
        self.reconnect_exhausted = true;
        let mut effects = vec![notify(
            NotificationKind::Error,
            "Failed to reconnect to the server. Please restart the client.",
        )];
        if self.phase.in_flight() {
            self.reset();
        }
        effects.push(failed(
            FailureKind::Connection,
            format!("gave up after {} reconnection attempts", self.max_reconnect_attempts),
        ));
        effects
    }

    fn on_connect_timeout(&mut self) -> Vec<Effect> {
        if self.connect_reported || self.is_connected() {
            return Vec::new();
        }
        self.connect_reported = true;
        vec![notify(
            NotificationKind::Error,
            "Failed to connect to server. Please check the server address.",
        )]
    }

    fn on_reconnect_timer(&mut self) -> Vec<Effect> {
        match self.connection {
            ConnectionState::Reconnecting { .. } if !self.reconnect_exhausted => vec![Effect::OpenChannel],
            _ => Vec::new(),
        }
    }

    // -- upload -------------------------------------------------------------

    fn on_upload_requested(&mut self, path: PathBuf) -> Vec<Effect> {
        if !self.view.upload_enabled || self.phase.in_flight() || self.phase == SessionPhase::Uploading {
            warn!(phase = ?self.phase, "upload ignored: control is disabled");
            return Vec::new();
        }
        self.phase = SessionPhase::Uploading;
        self.view.upload_enabled = false;
        self.view.upload_label = UPLOADING_LABEL.to_string();
        vec![Effect::StartUpload(path)]
    }

    fn on_upload_succeeded(&mut self, result: UploadResult) -> Vec<Effect> {
        if self.phase != SessionPhase::Uploading {
            warn!(phase = ?self.phase, "unexpected upload result ignored");
            return Vec::new();
        }
        info!(rows = result.row_count, columns = result.columns.len(), path = %result.file_path, "upload complete");
        self.phase = SessionPhase::Configuring;
        self.view.upload_label = UPLOAD_LABEL.to_string();
        self.view.config_visible = true;
        self.view.file_info = Some(format!("File loaded: {} rows", result.row_count));
        self.upload = Some(result);
        vec![notify(NotificationKind::Success, "File uploaded successfully!")]
    }

    fn on_upload_failed(&mut self, error: UploadError) -> Vec<Effect> {
        self.phase = if self.upload.is_some() { SessionPhase::Configuring } else { SessionPhase::Idle };
        self.view.upload_enabled = true;
        self.view.upload_label = UPLOAD_LABEL.to_string();
        let mut effects = vec![notify(NotificationKind::Error, error.to_string())];
        if let UploadError::SessionExpired { location } = &error {
            effects.push(Effect::RedirectToLogin { location: location.clone() });
        }
        effects.push(failed(FailureKind::Upload, error.to_string()));
        effects
    }

    // -- submission ---------------------------------------------------------

    fn on_submit(&mut self, mut fields: FormFields, now: Instant) -> Vec<Effect> {
        if self.phase.in_flight() || !self.view.submit_enabled {
            warn!(phase = ?self.phase, "submit ignored: a request is already in flight");
            return vec![notify(
                NotificationKind::Warning,
                "A processing request is already running.",
            )];
        }

        if fields.file_path.is_none() {
            fields.file_path = self.upload.as_ref().map(|u| u.file_path.clone());
        }

        let request = match build_request(&fields, &self.rules) {
            Ok(request) => request,
            Err(errors) => {
                let summary = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                self.view.field_errors = errors;
                return vec![failed(FailureKind::Validation, summary)];
            }
        };
        self.view.field_errors.clear();

        if self.submit_mode == SubmitMode::Channel && !self.is_connected() {
            let message = "Socket is not connected. Please check your connection.";
            self.reset();
            return vec![
                notify(NotificationKind::Error, message),
                failed(FailureKind::Submission, message),
            ];
        }

        self.phase = SessionPhase::Submitting;
        self.view.submit_enabled = false;
        self.view.submit_label = SUBMITTING_LABEL.to_string();
        self.view.progress_visible = true;
        self.view.progress_percent = 0;
        self.view.progress_text = "Processing started...".to_string();
        self.view.operation_status = "Initializing...".to_string();

        match self.submit_mode {
            SubmitMode::Channel => vec![Effect::EmitStartProcessing(request)],
            SubmitMode::Http => {
                self.phase = SessionPhase::Processing;
                // Without a channel no progress can arrive to feed the watchdog.
                if self.is_connected() {
                    self.watchdog.arm(now);
                }
                vec![Effect::PostProcess(request)]
            }
        }
    }

    fn on_ack(&mut self, ack: Option<Ack>, now: Instant) -> Vec<Effect> {
        if self.phase != SessionPhase::Submitting {
            debug!(?ack, phase = ?self.phase, "late acknowledgment ignored");
            return Vec::new();
        }
        match ack {
            Some(Ack::Ok) => {
                self.phase = SessionPhase::Processing;
                self.watchdog.arm(now);
                vec![notify(NotificationKind::Info, "Processing started.")]
            }
            Some(Ack::Error(message)) => self.fail_submission(message),
            Some(Ack::Unexpected(status)) => {
                warn!(status = %status, "unexpected acknowledgment status");
                self.fail_submission("Unexpected server response".to_string())
            }
            None => self.fail_submission("No response from server".to_string()),
        }
    }

    fn fail_submission(&mut self, message: String) -> Vec<Effect> {
        self.reset();
        vec![
            notify(NotificationKind::Error, message.clone()),
            failed(FailureKind::Submission, message),
        ]
    }

    fn on_http_finished(&mut self, result: Result<String, String>) -> Vec<Effect> {
        if !self.phase.in_flight() {
            debug!("process response arrived with no active session");
            return Vec::new();
        }
        match result {
            Ok(csv) => self.complete(Some(csv)),
            Err(message) => self.fail_submission(message),
        }
    }

    // -- server pushes ------------------------------------------------------

    fn on_server_event(&mut self, event: ServerEvent, now: Instant) -> Vec<Effect> {
        match event {
            ServerEvent::Progress(ev) => {
                self.on_progress(ev, now);
                Vec::new()
            }
            ServerEvent::Complete(payload) => {
                if !self.phase.in_flight() {
                    debug!("processing_complete with no active session ignored");
                    return Vec::new();
                }
                self.complete(payload.csv_data)
            }
            ServerEvent::Failed(failure) => {
                let message = failure.text();
                let mut effects = vec![notify(NotificationKind::Error, message.clone())];
                if self.phase.in_flight() {
                    self.reset();
                    effects.push(failed(FailureKind::Processing, message));
                }
                effects
            }
            ServerEvent::Quota(quota) => {
                self.view.quota = Some(quota);
                Vec::new()
            }
            ServerEvent::Other(name) => {
                debug!(event = %name, "unhandled server event");
                Vec::new()
            }
        }
    }

    fn on_progress(&mut self, mut ev: ProgressEvent, now: Instant) {
        if !self.phase.in_flight() {
            debug!(current = ev.current, total = ev.total, "progress with no active session ignored");
            return;
        }
        if ev.current > ev.total {
            warn!(current = ev.current, total = ev.total, "progress past total, clamping");
            ev.current = ev.total;
        }
        self.watchdog.feed(now);
        self.view.progress_visible = true;
        self.view.progress_percent = progress::percent(ev.current, ev.total);
        self.view.progress_text = progress::progress_text(&ev);
        self.view.operation_status = progress::operation_status(&ev);
        self.view.last_progress_at = Some(now);
    }

    fn complete(&mut self, csv: Option<String>) -> Vec<Effect> {
        let csv = csv.filter(|c| !c.trim().is_empty());
        self.reset();
        match csv {
            Some(csv) => vec![
                Effect::SaveDownload { csv },
                notify(NotificationKind::Success, "Processing complete! Your file is downloading."),
                Effect::Settled(SessionOutcome::Completed),
            ],
            None => {
                let message = "Processing finished but no result data was received.";
                vec![
                    notify(NotificationKind::Error, message),
                    failed(FailureKind::Processing, message),
                ]
            }
        }
    }

    fn on_watchdog_tick(&mut self, now: Instant) -> Vec<Effect> {
        if !self.watchdog.check(now) {
            return Vec::new();
        }
        let window = self.watchdog.window();
        warn!(window_s = window.as_secs(), "no progress within stall window");
        let message = "No progress updates received. The process might be stuck.";
        vec![
            notify(NotificationKind::Error, message),
            failed(FailureKind::Stall, message),
        ]
    }

    /// Back to the pre-submission baseline. Connection and quota survive.
    fn reset(&mut self) {
        self.phase = SessionPhase::Idle;
        self.upload = None;
        self.watchdog.disarm();
        self.view = ViewState::baseline(self.connection.to_string(), self.view.quota);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> (Controller, Instant) {
        let mut c = Controller::new(&ClientConfig::default());
        let t0 = Instant::now();
        c.handle(Msg::ConnectRequested, t0);
        c.handle(Msg::ChannelConnected { sid: Some("s1".into()) }, t0);
        (c, t0)
    }

    #[test]
    fn test_initial_state() {
        let c = Controller::new(&ClientConfig::default());
        assert_eq!(c.connection(), ConnectionState::Disconnected);
        assert_eq!(c.phase(), SessionPhase::Idle);
        assert_eq!(c.view().socket_status, "Disconnected");
        assert!(c.view().upload_enabled);
    }

    #[test]
    fn test_connect_requested_opens_channel_once() {
        let mut c = Controller::new(&ClientConfig::default());
        let t0 = Instant::now();
        assert_eq!(c.handle(Msg::ConnectRequested, t0), vec![Effect::OpenChannel]);
        assert_eq!(c.connection(), ConnectionState::Connecting);
        assert!(c.handle(Msg::ConnectRequested, t0).is_empty());
    }

    #[test]
    fn test_connected_resets_attempts_and_status() {
        let (c, _) = connected();
        assert!(c.is_connected());
        assert_eq!(c.view().socket_status, "Connected");
    }

    #[test]
    fn test_connect_timeout_reports_once() {
        let mut c = Controller::new(&ClientConfig::default());
        let t0 = Instant::now();
        c.handle(Msg::ConnectRequested, t0);
        assert_eq!(c.handle(Msg::ConnectTimeoutElapsed, t0).len(), 1);
        assert!(c.handle(Msg::ConnectTimeoutElapsed, t0).is_empty());
    }

    #[test]
    fn test_connect_timeout_silent_when_connected() {
        let (mut c, t0) = connected();
        assert!(c.handle(Msg::ConnectTimeoutElapsed, t0).is_empty());
    }

    #[test]
    fn test_reconnect_timer_ignored_when_connected() {
        let (mut c, t0) = connected();
        assert!(c.handle(Msg::ReconnectTimerFired, t0).is_empty());
    }

    #[test]
    fn test_quota_survives_reset() {
        let (mut c, t0) = connected();
        let q = ScrapeQuota { scrapes_used: 1, scrape_limit: 10 };
        c.handle(Msg::QuotaUpdated(Some(q)), t0);
        c.handle(Msg::ChannelClosed { reason: CloseReason::TransportClose }, t0);
        assert_eq!(c.view().quota, Some(q));
        c.handle(Msg::QuotaUpdated(None), t0);
        assert_eq!(c.view().quota, None);
    }

    #[test]
    fn test_client_disconnect_does_not_retry() {
        let (mut c, t0) = connected();
        let effects = c.handle(Msg::ChannelClosed { reason: CloseReason::ClientDisconnect }, t0);
        assert!(effects.is_empty());
        assert_eq!(c.connection(), ConnectionState::Disconnected);
        assert!(!c.reconnect_exhausted());
    }

    #[test]
    fn test_download_messages_notify() {
        let (mut c, t0) = connected();
        let effects = c.handle(Msg::DownloadFailed("disk full".into()), t0);
        assert_eq!(
            effects,
            vec![notify(NotificationKind::Error, "Could not save results: disk full")]
        );
    }
}
