use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

pub const TOAST_LIFETIME: Duration = Duration::from_millis(3000);
const MAX_TOASTS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Danger,
}

/// Fire-and-forget user notifications.
pub trait Notifier {
    fn notify(&mut self, message: String, level: Level);
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub message: String,
    pub level: Level,
    pub shown_at: Instant,
}

/// Transient notifications for the terminal UI. Oldest toasts fall off when
/// the queue is full, the rest expire after `TOAST_LIFETIME`.
#[derive(Debug, Default)]
pub struct Toasts {
    queue: VecDeque<Toast>,
}

impl Toasts {
    pub fn new() -> Toasts {
        Toasts::default()
    }

    pub fn push_at(&mut self, message: String, level: Level, now: Instant) {
        if self.queue.len() == MAX_TOASTS {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            message,
            level,
            shown_at: now,
        });
    }

    pub fn prune(&mut self, now: Instant) {
        self.queue
            .retain(|toast| now.saturating_duration_since(toast.shown_at) < TOAST_LIFETIME);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Notifier for Toasts {
    fn notify(&mut self, message: String, level: Level) {
        info!(?level, %message, "notification");
        self.push_at(message, level, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_expire() {
        let start = Instant::now();
        let mut toasts = Toasts::new();
        toasts.push_at("saved".into(), Level::Success, start);
        toasts.push_at("later".into(), Level::Info, start + Duration::from_millis(2000));

        toasts.prune(start + Duration::from_millis(3500));
        let left: Vec<&str> = toasts.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(left, vec!["later"]);

        toasts.prune(start + Duration::from_millis(6000));
        assert!(toasts.is_empty());
    }

    #[test]
    fn test_oldest_toast_dropped_when_full() {
        let now = Instant::now();
        let mut toasts = Toasts::new();
        for i in 0..=MAX_TOASTS {
            toasts.push_at(format!("t{}", i), Level::Info, now);
        }
        assert_eq!(toasts.iter().count(), MAX_TOASTS);
        assert_eq!(toasts.iter().next().unwrap().message, "t1");
    }
}
