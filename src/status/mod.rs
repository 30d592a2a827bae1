use std::time::{Duration, Instant};

use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StatusKind {
    Error,
    Success,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
    set_at: Instant,
}

impl StatusMessage {
    fn expires(&self) -> bool {
        matches!(self.kind, StatusKind::Error | StatusKind::Success)
    }
}

/// Loading flag plus at most one banner. Error and success banners dismiss
/// themselves once `dismiss_after` has passed since they were set.
#[derive(Debug, Clone)]
pub struct StatusState {
    loading: bool,
    message: Option<StatusMessage>,
    dismiss_after: Duration,
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl StatusState {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            loading: false,
            message: None,
            dismiss_after,
        }
    }

    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.set_message_at(StatusKind::Error, text, Instant::now());
    }

    pub fn set_success(&mut self, text: impl Into<String>) {
        self.set_message_at(StatusKind::Success, text, Instant::now());
    }

    pub fn set_info(&mut self, text: impl Into<String>) {
        self.set_message_at(StatusKind::Info, text, Instant::now());
    }

    /// Replaces any current banner and restarts the dismissal timer.
    pub fn set_message_at(&mut self, kind: StatusKind, text: impl Into<String>, now: Instant) {
        self.message = Some(StatusMessage {
            kind,
            text: text.into(),
            set_at: now,
        });
    }

    pub fn clear(&mut self) {
        self.message = None;
    }

    /// Drops an expired banner. Returns whether one was dismissed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let expired = self.message.as_ref().is_some_and(|message| {
            message.expires() && now.saturating_duration_since(message.set_at) >= self.dismiss_after
        });
        if expired {
            self.message = None;
        }
        expired
    }

    pub fn visible(&self) -> Option<&StatusMessage> {
        self.message.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|message| message.kind == StatusKind::Error)
            .map(|message| message.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banners_clear_after_dismiss_delay() {
        let mut status = StatusState::new(Duration::from_secs(5));
        let start = Instant::now();
        status.set_message_at(StatusKind::Success, "Đã lưu", start);

        assert!(!status.tick(start + Duration::from_secs(4)));
        assert_eq!(status.visible().map(|m| m.text.as_str()), Some("Đã lưu"));
        assert!(status.tick(start + Duration::from_secs(5)));
        assert!(status.visible().is_none());
    }

    #[test]
    fn new_message_restarts_timer_and_replaces_old() {
        let mut status = StatusState::new(Duration::from_secs(5));
        let start = Instant::now();
        status.set_message_at(StatusKind::Error, "first", start);
        status.set_message_at(StatusKind::Success, "second", start + Duration::from_secs(3));

        assert!(status.error().is_none());
        assert!(!status.tick(start + Duration::from_secs(6)));
        assert!(status.tick(start + Duration::from_secs(8)));
    }

    #[test]
    fn info_banners_stay_until_replaced() {
        let mut status = StatusState::default();
        let start = Instant::now();
        status.set_message_at(StatusKind::Info, "Không có kết quả", start);
        assert!(!status.tick(start + Duration::from_secs(60)));
        assert_eq!(status.visible().map(|m| m.kind), Some(StatusKind::Info));
    }

    #[test]
    fn loading_is_independent_of_banner() {
        let mut status = StatusState::default();
        status.begin_loading();
        status.set_error("offline");
        assert!(status.is_loading());
        status.finish_loading();
        assert_eq!(status.error(), Some("offline"));
    }
}
