//! Terminal session: the connect / notify / send / disconnect lifecycle over
//! a single UART link, with an append-only chronological log.
//!
//! The session is an explicit object: the connector and the notification sink
//! are injected at construction, and inbound traffic arrives through one
//! event channel fed by the connector's forwarding task. At most one
//! connection handle exists at a time; it is released exactly once whether
//! the user or the device ends the link.

use crate::domain::models::{
    ConnectionStatus, LogDirection, LogEntry, Notifier, StatusMessage,
};
use crate::infrastructure::bluetooth::connector::{
    ConnectError, ConnectedLink, SessionEvent, UartConnector,
};
use crate::infrastructure::bluetooth::protocol;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct TerminalSession {
    logs: Vec<LogEntry>,
    status: ConnectionStatus,
    link: Option<ConnectedLink>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    notifier: Notifier,
}

impl TerminalSession {
    pub fn new(notifier: Notifier) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            logs: Vec::new(),
            status: ConnectionStatus::Disconnected,
            link: None,
            events_tx,
            events_rx,
            notifier,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        self.status.is_connecting()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    /// Name of the connected device, if any.
    pub fn device_name(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.device_name.as_str())
    }

    /// Device identifier read from the Device Information service, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.link.as_ref().and_then(|l| l.device_id.as_deref())
    }

    /// Run the full picker + negotiation chain. Every outcome lands in the
    /// log; only consequential failures also raise a notification. Does
    /// nothing unless currently disconnected.
    pub async fn connect(&mut self, connector: &dyn UartConnector) {
        if self.status != ConnectionStatus::Disconnected {
            return;
        }

        // Fresh channel per attempt: a forwarder left over from an earlier
        // link holds the old sender, so its late events (including its final
        // drop notice) can never reach this connection.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events_tx = events_tx;
        self.events_rx = events_rx;

        self.status = ConnectionStatus::Requesting;
        self.push_status("Requesting Bluetooth device...");

        let picked = match connector.request_device().await {
            Ok(Some(device)) => device,
            Ok(None) => {
                self.push_status("Connection cancelled. No device selected.");
                self.status = ConnectionStatus::Disconnected;
                return;
            }
            Err(e) => {
                self.push_status(format!("Error: {e}"));
                self.notify(StatusMessage::error(format!("Connection Failed: {e}")));
                self.status = ConnectionStatus::Disconnected;
                return;
            }
        };

        self.push_status(format!("Connecting to {}...", picked.name()));
        self.status = ConnectionStatus::Negotiating;

        match picked.negotiate(self.events_tx.clone()).await {
            Ok(link) => {
                info!(device = %link.device_name, "UART link established");
                self.link = Some(link);
                self.pump_events();
                self.push_status("Connection successful!");
                self.status = ConnectionStatus::Connected;
                self.notify(StatusMessage::success(
                    "Device Connected. Terminal is ready to use.",
                ));
            }
            Err(ConnectError::AdapterUnavailable(msg)) => {
                self.pump_events();
                self.push_status(format!("Error: {msg}"));
                self.notify(StatusMessage::error(format!("Connection Failed: {msg}")));
                self.status = ConnectionStatus::Disconnected;
            }
            Err(ConnectError::Negotiation(msg)) => {
                warn!("Negotiation failed: {msg}");
                self.pump_events();
                self.push_status(format!("Error: {msg}"));
                self.notify(StatusMessage::error(format!("Connection Failed: {msg}")));
                self.status = ConnectionStatus::Disconnected;
            }
        }
    }

    /// Write raw bytes to the device. A silent no-op with no link. Write
    /// failures are logged and notified but never drop the connection.
    pub async fn send(&mut self, payload: &[u8]) {
        let Some(link) = self.link.as_ref() else {
            return;
        };

        match link.link.write(payload).await {
            Ok(()) => {
                self.push_log(LogDirection::Out, protocol::format_out_entry(payload));
            }
            Err(e) => {
                self.push_status(format!("Send Error: {e}"));
                self.notify(StatusMessage::error(format!("Send Error: {e}")));
            }
        }
    }

    /// User-initiated disconnect. No-op when already disconnected.
    pub async fn disconnect(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        link.link.close().await;
        self.status = ConnectionStatus::Disconnected;
        self.push_status("Device disconnected.");
        info!("UART link closed");
    }

    /// Drain pending link events without blocking.
    pub fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }
    }

    /// Wait for the next link event and fold it into the session. Returns
    /// `false` if the event channel is gone (the session itself owns a
    /// sender, so in practice this pends until an event arrives).
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.apply_event(event);
                true
            }
            None => false,
        }
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Status(message) => self.push_status(message),
            SessionEvent::Inbound(payload) => {
                let text = String::from_utf8_lossy(&payload).to_string();
                self.push_log(LogDirection::In, text);
            }
            SessionEvent::Dropped => {
                // Stale drop events after an explicit disconnect carry no
                // handle to release and are ignored.
                if self.link.take().is_some() {
                    self.status = ConnectionStatus::Disconnected;
                    self.push_status("Device disconnected.");
                }
            }
        }
    }

    fn push_status(&mut self, message: impl Into<String>) {
        self.push_log(LogDirection::Status, message.into());
    }

    fn push_log(&mut self, direction: LogDirection, message: String) {
        self.logs.push(LogEntry::new(direction, message));
    }

    fn notify(&self, message: StatusMessage) {
        let _ = self.notifier.send(message);
    }
}
