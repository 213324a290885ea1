//! Notification surface: transient, dismissible banners.
//!
//! A [`Notifier`] owns the list of live banners and pushes them into a
//! [`BannerContainer`]. Banners auto-expire after a fixed delay; expiry is
//! driven by [`Notifier::expire`] so callers decide when time advances.

use std::time::{Duration, Instant};

use colored::*;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Error   => write!(f, "error"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Info    => write!(f, "info"),
        }
    }
}

impl NotificationKind {
    /// Banner heading: the kind name with its first letter capitalized.
    pub fn heading(self) -> String {
        let name = self.to_string();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

pub type BannerId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub id: BannerId,
    pub kind: NotificationKind,
    pub message: String,
    pub expires_at: Instant,
}

/// Where banners are displayed.
pub trait BannerContainer: Send {
    fn append(&mut self, banner: &Banner);
    fn remove(&mut self, id: BannerId);
}

/// Prints banners to stderr with a colored heading.
#[derive(Debug, Default)]
pub struct TerminalContainer;

impl TerminalContainer {
    pub fn render(banner: &Banner) -> String {
        let heading = format!("{}:", banner.kind.heading());
        let heading = match banner.kind {
            NotificationKind::Success => heading.bright_green().bold(),
            NotificationKind::Error   => heading.bright_red().bold(),
            NotificationKind::Warning => heading.bright_yellow().bold(),
            NotificationKind::Info    => heading.bright_cyan().bold(),
        };
        format!("{} {}", heading, banner.message)
    }
}

impl BannerContainer for TerminalContainer {
    fn append(&mut self, banner: &Banner) {
        eprintln!("{}", Self::render(banner));
    }

    // A printed line cannot be taken back.
    fn remove(&mut self, _id: BannerId) {}
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct Notifier {
    container: Option<Box<dyn BannerContainer>>,
    dismiss_after: Duration,
    live: Vec<Banner>,
    next_id: BannerId,
}

impl Notifier {
    pub fn new(container: Box<dyn BannerContainer>, dismiss_after: Duration) -> Self {
        Self { container: Some(container), dismiss_after, live: Vec::new(), next_id: 1 }
    }

    /// A notifier with nowhere to draw; every call is a logged no-op.
    pub fn detached(dismiss_after: Duration) -> Self {
        Self { container: None, dismiss_after, live: Vec::new(), next_id: 1 }
    }

    /// Show `message` as a banner of `kind`, removed automatically after the
    /// configured delay. Returns `None` when no container is attached.
    pub fn notify(
        &mut self,
        message: &str,
        kind: NotificationKind,
        now: Instant,
    ) -> Option<BannerId> {
        // The container is the user-facing channel; the log only traces it.
        debug!(kind = %kind, "{message}");

        let Some(container) = self.container.as_mut() else {
            warn!(kind = %kind, message, "alert container not found, dropping notification");
            return None;
        };

        let banner = Banner {
            id: self.next_id,
            kind,
            message: message.to_string(),
            expires_at: now + self.dismiss_after,
        };
        self.next_id += 1;
        container.append(&banner);
        let id = banner.id;
        self.live.push(banner);
        Some(id)
    }

    /// Remove every banner whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> usize {
        let (due, keep): (Vec<Banner>, Vec<Banner>) =
            self.live.drain(..).partition(|b| b.expires_at <= now);
        self.live = keep;
        if let Some(container) = self.container.as_mut() {
            for banner in &due {
                container.remove(banner.id);
            }
        }
        due.len()
    }

    /// Close one banner before its deadline. Returns whether it was live.
    pub fn dismiss(&mut self, id: BannerId) -> bool {
        let before = self.live.len();
        self.live.retain(|b| b.id != id);
        let removed = self.live.len() != before;
        if removed {
            if let Some(container) = self.container.as_mut() {
                container.remove(id);
            }
        }
        removed
    }

    pub fn live(&self) -> &[Banner] {
        &self.live
    }

    /// Earliest pending expiry, if any banner is live.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live.iter().map(|b| b.expires_at).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recording {
        shown: Arc<Mutex<Vec<BannerId>>>,
        removed: Arc<Mutex<Vec<BannerId>>>,
    }

    impl BannerContainer for Recording {
        fn append(&mut self, banner: &Banner) {
            self.shown.lock().unwrap().push(banner.id);
        }
        fn remove(&mut self, id: BannerId) {
            self.removed.lock().unwrap().push(id);
        }
    }

    fn notifier() -> (Notifier, Recording) {
        let rec = Recording::default();
        (Notifier::new(Box::new(rec.clone()), Duration::from_secs(5)), rec)
    }

    #[test]
    fn test_heading_capitalizes_kind() {
        assert_eq!(NotificationKind::Success.heading(), "Success");
        assert_eq!(NotificationKind::Warning.heading(), "Warning");
    }

    #[test]
    fn test_notify_appends_banner() {
        let (mut n, rec) = notifier();
        let t0 = Instant::now();
        let id = n.notify("File uploaded successfully!", NotificationKind::Success, t0);
        assert_eq!(id, Some(1));
        assert_eq!(n.live().len(), 1);
        assert_eq!(*rec.shown.lock().unwrap(), vec![1]);
        assert_eq!(n.next_deadline(), Some(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_expire_removes_only_due_banners() {
        let (mut n, rec) = notifier();
        let t0 = Instant::now();
        n.notify("first", NotificationKind::Info, t0);
        n.notify("second", NotificationKind::Info, t0 + Duration::from_secs(3));
        assert_eq!(n.expire(t0 + Duration::from_secs(4)), 0);
        assert_eq!(n.expire(t0 + Duration::from_secs(5)), 1);
        assert_eq!(n.live().len(), 1);
        assert_eq!(n.live()[0].message, "second");
        assert_eq!(*rec.removed.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_dismiss_early() {
        let (mut n, rec) = notifier();
        let id = n.notify("x", NotificationKind::Error, Instant::now()).unwrap();
        assert!(n.dismiss(id));
        assert!(!n.dismiss(id));
        assert!(n.live().is_empty());
        assert_eq!(*rec.removed.lock().unwrap(), vec![id]);
    }

    #[test]
    fn test_detached_notifier_is_noop() {
        let mut n = Notifier::detached(Duration::from_secs(5));
        assert_eq!(n.notify("lost", NotificationKind::Error, Instant::now()), None);
        assert!(n.live().is_empty());
        assert_eq!(n.expire(Instant::now() + Duration::from_secs(60)), 0);
    }

    #[derive(Clone, Default)]
    struct LogBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_at(level: tracing::Level, f: impl FnOnce()) -> String {
        let buf = LogBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_banners_not_echoed_at_default_log_level() {
        let (mut n, rec) = notifier();
        let out = logged_at(tracing::Level::WARN, || {
            n.notify("Upload failed", NotificationKind::Error, Instant::now());
            n.notify("Reconnection attempt 1 of 5...", NotificationKind::Warning, Instant::now());
        });
        assert_eq!(out, "");
        assert_eq!(rec.shown.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_banners_traced_at_debug() {
        let (mut n, _rec) = notifier();
        let out = logged_at(tracing::Level::DEBUG, || {
            n.notify("Upload failed", NotificationKind::Error, Instant::now());
        });
        assert!(out.contains("Upload failed"), "{out}");
    }

    #[test]
    fn test_detached_notifier_logs_dropped_message() {
        let mut n = Notifier::detached(Duration::from_secs(5));
        let out = logged_at(tracing::Level::WARN, || {
            n.notify("lost", NotificationKind::Error, Instant::now());
        });
        assert!(out.contains("alert container not found"), "{out}");
        assert!(out.contains("lost"), "{out}");
    }

    #[test]
    fn test_terminal_render_contains_heading_and_message() {
        colored::control::set_override(false);
        let banner = Banner {
            id: 1,
            kind: NotificationKind::Error,
            message: "Upload failed".into(),
            expires_at: Instant::now(),
        };
        assert_eq!(TerminalContainer::render(&banner), "Error: Upload failed");
    }
}
