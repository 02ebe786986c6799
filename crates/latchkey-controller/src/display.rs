//! Display collaborator and the in-memory panel used by the console and
//! the tests.
//!
//! The controller only talks to [`Display`]. It does not know about
//! widgets; a notification is a block of text with up to three buttons, and
//! a confirmation is a notification whose answer arrives on a oneshot
//! channel.
//!
//! # Examples
//!
//! ```
//! use latchkey_controller::{Display, VirtualDisplay};
//!
//! let display = VirtualDisplay::new();
//! display.set_status_text("Unlocked for 00:03.");
//! display.show_notification("Access denied.\nFingerprint not recognized.");
//!
//! assert_eq!(display.status_text(), "Unlocked for 00:03.");
//! assert_eq!(
//!     display.notification().as_deref(),
//!     Some("Access denied.\nFingerprint not recognized.")
//! );
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info};

/// Panel width in characters.
pub const DISPLAY_COLUMNS: usize = 40;

/// Surface the controller reports to.
pub trait Display: Send + Sync {
    /// Show a message with a single dismiss button.
    fn show_notification(&self, text: &str);

    /// Close the current notification, if any.
    fn close_notification(&self);

    /// Ask a yes/no question. Dropping the sender without an answer counts
    /// as a decline.
    fn request_confirmation(&self, text: &str) -> oneshot::Receiver<bool>;

    /// Replace the status line.
    fn set_status_text(&self, text: &str);

    fn set_system_locked(&self, locked: bool);

    fn set_manual_unlocks(&self, enabled: bool);

    /// Replace the credential listing, already ordered and formatted.
    fn show_credentials(&self, labels: &[String]);
}

/// Keep at most `max_chars` characters of `text`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Default)]
struct Panel {
    status_text: String,
    notification: Option<String>,
    pending: Option<oneshot::Sender<bool>>,
    system_locked: bool,
    manual_unlocks: bool,
    credentials: Vec<String>,
    notifications: Vec<String>,
}

/// Headless [`Display`] that keeps everything in memory.
///
/// Every notification is also appended to a log so tests can assert on
/// messages that were closed again before they looked.
#[derive(Debug, Default)]
pub struct VirtualDisplay {
    panel: Mutex<Panel>,
}

impl VirtualDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn panel(&self) -> MutexGuard<'_, Panel> {
        self.panel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status_text(&self) -> String {
        self.panel().status_text.clone()
    }

    pub fn notification(&self) -> Option<String> {
        self.panel().notification.clone()
    }

    /// Every notification shown so far, oldest first.
    pub fn notifications(&self) -> Vec<String> {
        self.panel().notifications.clone()
    }

    pub fn system_locked(&self) -> bool {
        self.panel().system_locked
    }

    pub fn manual_unlocks(&self) -> bool {
        self.panel().manual_unlocks
    }

    pub fn credentials(&self) -> Vec<String> {
        self.panel().credentials.clone()
    }

    /// Whether a confirmation is waiting for an answer.
    pub fn awaiting_confirmation(&self) -> bool {
        self.panel().pending.is_some()
    }

    /// Answer the pending confirmation.
    ///
    /// Returns `false` if nothing was waiting.
    pub fn answer_confirmation(&self, confirmed: bool) -> bool {
        let mut panel = self.panel();
        let Some(pending) = panel.pending.take() else {
            return false;
        };
        panel.notification = None;
        debug!(confirmed, "Confirmation answered");
        // The requester may have timed out already.
        let _ = pending.send(confirmed);
        true
    }

    /// The panel as text: status line, indicator line, then the open
    /// notification, each cut to the panel width.
    pub fn render(&self) -> Vec<String> {
        let panel = self.panel();
        let mut lines = vec![
            truncate_text(&panel.status_text, DISPLAY_COLUMNS),
            truncate_text(
                &format!(
                    "System {} | Manual unlocks {}",
                    if panel.system_locked { "locked" } else { "unlocked" },
                    if panel.manual_unlocks { "on" } else { "off" },
                ),
                DISPLAY_COLUMNS,
            ),
        ];
        if let Some(notification) = &panel.notification {
            lines.extend(
                notification
                    .lines()
                    .map(|line| truncate_text(line, DISPLAY_COLUMNS)),
            );
            if panel.pending.is_some() {
                lines.push("[yes] [no]".to_string());
            }
        }
        lines
    }
}

impl Display for VirtualDisplay {
    fn show_notification(&self, text: &str) {
        info!(text = %text.replace('\n', " "), "Notification");
        let mut panel = self.panel();
        // A plain message replaces an open question, which then reads as declined.
        panel.pending = None;
        panel.notification = Some(text.to_string());
        panel.notifications.push(text.to_string());
    }

    fn close_notification(&self) {
        let mut panel = self.panel();
        panel.notification = None;
        panel.pending = None;
    }

    fn request_confirmation(&self, text: &str) -> oneshot::Receiver<bool> {
        info!(text = %text.replace('\n', " "), "Confirmation requested");
        let (tx, rx) = oneshot::channel();
        let mut panel = self.panel();
        panel.pending = Some(tx);
        panel.notification = Some(text.to_string());
        panel.notifications.push(text.to_string());
        rx
    }

    fn set_status_text(&self, text: &str) {
        let mut panel = self.panel();
        if panel.status_text != text {
            debug!(text = %text, "Status text");
            panel.status_text = text.to_string();
        }
    }

    fn set_system_locked(&self, locked: bool) {
        self.panel().system_locked = locked;
    }

    fn set_manual_unlocks(&self, enabled: bool) {
        self.panel().manual_unlocks = enabled;
    }

    fn show_credentials(&self, labels: &[String]) {
        self.panel().credentials = labels.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Unlocked for 00:03.", 8), "Unlocked");
        assert_eq!(truncate_text("Short", 10), "Short");
    }

    #[tokio::test]
    async fn test_confirmation_answer_reaches_requester() {
        let display = VirtualDisplay::new();
        let answer = display.request_confirmation("Use your Emergency Use?");

        assert!(display.awaiting_confirmation());
        assert!(display.answer_confirmation(true));
        assert_eq!(answer.await, Ok(true));
        assert_eq!(display.notification(), None);
    }

    #[tokio::test]
    async fn test_notification_discards_pending_question() {
        let display = VirtualDisplay::new();
        let answer = display.request_confirmation("Use your Emergency Use?");
        display.show_notification("Access denied.");

        assert!(answer.await.is_err());
        assert!(!display.answer_confirmation(true));
    }

    #[test]
    fn test_answer_without_question() {
        let display = VirtualDisplay::new();
        assert!(!display.answer_confirmation(false));
    }

    #[test]
    fn test_render_cuts_to_panel_width() {
        let display = VirtualDisplay::new();
        display.set_status_text(&"x".repeat(60));
        display.set_manual_unlocks(true);
        display.show_notification("Access denied.\nFingerprint not recognized.");

        let lines = display.render();
        assert_eq!(lines[0].len(), DISPLAY_COLUMNS);
        assert_eq!(lines[1], "System unlocked | Manual unlocks on");
        assert_eq!(&lines[2..], ["Access denied.", "Fingerprint not recognized."]);
    }

    #[test]
    fn test_notification_log_survives_close() {
        let display = VirtualDisplay::new();
        display.show_notification("first");
        display.close_notification();
        display.show_notification("second");

        assert_eq!(display.notifications(), vec!["first", "second"]);
        assert_eq!(display.notification().as_deref(), Some("second"));
    }
}
