//! Notification dispatch seam.
//!
//! The engine emits at most one notification per reminder firing;
//! implementations decide how it reaches the user. Headless runs log,
//! embedding presentation layers drain a channel.

use tokio::sync::mpsc;
use tracing::info;

/// A dispatched notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Delivers user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Notifier that writes to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(title, body, "Notification dispatched");
    }
}

/// Notifier that forwards notifications to a channel for a consumer
/// (a presentation layer, or a test) to drain.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// New notifier plus the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, title: &str, body: &str) {
        // A gone consumer just means nobody is listening any more.
        let _ = self.tx.send(Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify("title", "body");

        let seen = rx.try_recv().unwrap();
        assert_eq!(seen.title, "title");
        assert_eq!(seen.body, "body");
    }

    #[test]
    fn dropped_receiver_is_tolerated() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify("title", "body");
    }
}
