use serde::{Deserialize, Serialize};

/// Direction tag for a terminal log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDirection {
    /// Data received from the device.
    In,
    /// Data written to the device.
    Out,
    /// Connection lifecycle and error messages.
    Status,
}

/// One line of the terminal log. Append-only; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub direction: LogDirection,
    pub message: String,
    /// Unix milliseconds at append time.
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(direction: LogDirection, message: impl Into<String>) -> Self {
        Self {
            direction,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Lifecycle of the single Bluetooth terminal link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    /// Scanning for a device advertising the UART service.
    Requesting,
    /// GATT connect / service discovery / subscription in progress.
    Negotiating,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }

    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Requesting | ConnectionStatus::Negotiating
        )
    }
}

/// A transient user-facing notification (toast-style).
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for transient notifications. Components hold the sender; whoever
/// renders them holds the receiver. Sends are best-effort: a dropped receiver
/// never fails an operation.
pub type Notifier = tokio::sync::mpsc::UnboundedSender<StatusMessage>;
