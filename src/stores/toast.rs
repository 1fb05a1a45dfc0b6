use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const DEFAULT_TOAST_DURATION_MS: i64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Warning,
    Error,
    Info,
}

impl ToastKind {
    pub fn css_class(self) -> &'static str {
        match self {
            ToastKind::Success => "toast-success",
            ToastKind::Warning => "toast-warning",
            ToastKind::Error => "toast-error",
            ToastKind::Info => "toast-info",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub title: String,
    pub message: Option<String>,
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= self.duration
    }
}

/// Очередь уведомлений сессии. Живёт только в памяти.
#[derive(Default)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
}

impl ToastQueue {
    pub fn show(&mut self, kind: ToastKind, title: impl Into<String>, message: Option<String>, duration: Option<Duration>) -> Uuid {
        let toast = Toast {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message,
            duration: duration.unwrap_or_else(|| Duration::milliseconds(DEFAULT_TOAST_DURATION_MS)),
            created_at: Utc::now(),
        };
        let id = toast.id;
        self.toasts.push(toast);
        id
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(ToastKind::Success, title, Some(message.into()), None)
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(ToastKind::Warning, title, Some(message.into()), None)
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(ToastKind::Error, title, Some(message.into()), None)
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) -> Uuid {
        self.show(ToastKind::Info, title, Some(message.into()), None)
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        before != self.toasts.len()
    }

    /// Выбрасывает истёкшие и возвращает то, что ещё надо показать.
    pub fn visible(&mut self, now: DateTime<Utc>) -> Vec<Toast> {
        self.toasts.retain(|t| !t.is_expired(now));
        self.toasts.clone()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}
