use std::sync::Mutex;

/// Toast surface for user-facing feedback.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sends toasts to the log. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Success(String),
    Error(String),
}

/// Keeps every toast so callers can assert on what the user would have seen.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.toasts()
            .into_iter()
            .filter_map(|t| match t {
                Toast::Error(message) => Some(message),
                Toast::Success(_) => None,
            })
            .collect()
    }

    fn push(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(toast);
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.push(Toast::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Toast::Error(message.to_string()));
    }
}
