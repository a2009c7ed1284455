// Kaeppa Head Unit — Auto-Reconnect Policy
//
// Decides, on every link loss, whether the sink re-dials the last peer.
// Re-dialling continues until the window has elapsed since the first
// unrequested loss; a disconnect the user asked for is never undone.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectPolicy {
    window: Option<Duration>,
    /// First unrequested loss since the last connect.
    lost_at: Option<Instant>,
    /// The next loss was asked for by the user.
    user_disconnect: bool,
}

impl ReconnectPolicy {
    pub const fn new() -> Self {
        Self {
            window: None,
            lost_at: None,
            user_disconnect: false,
        }
    }

    /// `None` disables auto-reconnect.
    pub fn set_window(&mut self, window: Option<Duration>) {
        self.window = window;
    }

    pub fn is_enabled(&self) -> bool {
        self.window.is_some()
    }

    pub fn connected(&mut self) {
        self.lost_at = None;
        self.user_disconnect = false;
    }

    /// Call before handing the disconnect to the stack.
    pub fn disconnect_requested(&mut self) {
        self.user_disconnect = true;
    }

    /// The stack refused the disconnect; the next loss is not the user's.
    pub fn disconnect_failed(&mut self) {
        self.user_disconnect = false;
    }

    /// The link dropped at `now`. Returns true when the last peer should be
    /// dialled again.
    pub fn link_lost(&mut self, now: Instant) -> bool {
        if std::mem::take(&mut self.user_disconnect) {
            return false;
        }
        let Some(window) = self.window else {
            return false;
        };
        let lost_at = *self.lost_at.get_or_insert(now);
        now.saturating_duration_since(lost_at) < window
    }
}
