//! Transient user notifications.
//!
//! Every outcome the user should see (staging, processing, export, health)
//! becomes a `Notification`. Sinks decide how to show it; none of them block
//! or fail.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a notification stays visible unless configured otherwise.
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(5000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    /// Time before the notification dismisses itself.
    pub duration: Duration,
}

pub trait Notifier: Send {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to stderr, one line each.
///
/// Terminal lines scroll away on their own, so `duration` is not used.
#[derive(Clone, Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        log::debug!(
            "notification ({}, {:?}): {}",
            notification.level,
            notification.duration,
            notification.message
        );
        let marker = match notification.level {
            Level::Info => "i",
            Level::Success => "✔",
            Level::Warning => "!",
            Level::Error => "✖",
        };
        eprintln!("{} {}", marker, notification.message);
    }
}

/// Keeps every notification; clones share the same list.
#[derive(Clone, Debug, Default)]
pub struct MemoryNotifier {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.last().cloned())
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_notifier_clones_share_entries() {
        let notifier = MemoryNotifier::new();
        let handle = notifier.clone();
        notifier.notify(Notification {
            level: Level::Warning,
            message: "No results to download".into(),
            duration: DEFAULT_NOTIFICATION_DURATION,
        });
        assert_eq!(handle.entries().len(), 1);
        assert_eq!(handle.last().unwrap().level, Level::Warning);
    }
}
