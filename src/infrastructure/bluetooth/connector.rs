//! Device discovery and GATT negotiation.
//!
//! Stands in for the browser's device picker: scan for the configured window,
//! take the first peripheral advertising the UART service, then walk the
//! negotiation chain (connect, discover, locate RX/TX, subscribe). Inbound
//! notifications are forwarded into the session's event channel by a spawned
//! task, so the session consumes radio traffic as an explicit stream rather
//! than ad-hoc callbacks.

use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol;
use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything the session observes from the link after connect.
#[derive(Debug)]
pub enum SessionEvent {
    /// Negotiation progress or link-level error text for the status log.
    Status(String),
    /// One inbound notification payload.
    Inbound(Vec<u8>),
    /// The device side dropped the connection.
    Dropped,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Bluetooth is not available: {0}")]
    AdapterUnavailable(String),
    #[error("{0}")]
    Negotiation(String),
}

/// Write half of an established UART link.
#[async_trait]
pub trait UartLink: Send + Sync {
    async fn write(&self, payload: &[u8]) -> Result<(), String>;

    /// Best-effort teardown. The device-side drop event that follows is
    /// reported through the event channel and ignored by the session.
    async fn close(&self);
}

/// A fully negotiated connection handle.
pub struct ConnectedLink {
    pub device_name: String,
    /// UTF-8 decoded System ID, read once at pairing time when the device
    /// exposes the Device Information service.
    pub device_id: Option<String>,
    pub link: Box<dyn UartLink>,
}

/// A device chosen by the picker, ready to negotiate.
#[async_trait]
pub trait PickedDevice: Send {
    fn name(&self) -> String;

    async fn negotiate(
        self: Box<Self>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<ConnectedLink, ConnectError>;
}

/// The picker seam. `Ok(None)` means nothing was found or the user backed
/// out; the session treats that as a quiet return to disconnected.
#[async_trait]
pub trait UartConnector: Send + Sync {
    async fn request_device(&self) -> Result<Option<Box<dyn PickedDevice>>, ConnectError>;
}

/// Resolved BLE configuration (UUIDs parsed from settings).
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    pub service_uuid: Uuid,
    pub rx_char_uuid: Uuid,
    pub tx_char_uuid: Uuid,
    pub scan_window: Duration,
}

impl TerminalConfig {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            service_uuid: protocol::parse_uuid(&settings.ble_service_uuid)?,
            rx_char_uuid: protocol::parse_uuid(&settings.ble_rx_char_uuid)?,
            tx_char_uuid: protocol::parse_uuid(&settings.ble_tx_char_uuid)?,
            scan_window: Duration::from_secs(settings.scan_window_secs),
        })
    }
}

/// Real connector over the platform Bluetooth stack.
pub struct BleConnector {
    config: TerminalConfig,
}

impl BleConnector {
    pub fn new(config: TerminalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UartConnector for BleConnector {
    async fn request_device(&self) -> Result<Option<Box<dyn PickedDevice>>, ConnectError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ConnectError::AdapterUnavailable(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| ConnectError::AdapterUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ConnectError::AdapterUnavailable("no Bluetooth adapter found".to_string())
            })?;

        info!(service = %self.config.service_uuid, "Scanning for UART device");
        adapter
            .start_scan(ScanFilter {
                services: vec![self.config.service_uuid],
            })
            .await
            .map_err(|e| ConnectError::Negotiation(e.to_string()))?;
        sleep(self.config.scan_window).await;

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| ConnectError::Negotiation(e.to_string()))?;
        let _ = adapter.stop_scan().await;

        for peripheral in peripherals {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            if !props.services.contains(&self.config.service_uuid) {
                continue;
            }
            let name = props
                .local_name
                .unwrap_or_else(|| peripheral.address().to_string());
            debug!(%name, "UART device found");
            return Ok(Some(Box::new(BlePickedDevice {
                peripheral,
                name,
                config: self.config.clone(),
            })));
        }

        info!("Scan window elapsed with no UART device");
        Ok(None)
    }
}

struct BlePickedDevice {
    peripheral: Peripheral,
    name: String,
    config: TerminalConfig,
}

#[async_trait]
impl PickedDevice for BlePickedDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn negotiate(
        self: Box<Self>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<ConnectedLink, ConnectError> {
        let neg = |e: btleplug::Error| ConnectError::Negotiation(e.to_string());
        let peripheral = self.peripheral;

        peripheral.connect().await.map_err(neg)?;

        let _ = events.send(SessionEvent::Status("Getting UART service...".to_string()));
        peripheral.discover_services().await.map_err(neg)?;
        let uart = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == self.config.service_uuid)
            .ok_or_else(|| ConnectError::Negotiation("UART service not found".to_string()))?;

        let _ = events.send(SessionEvent::Status(
            "Getting RX characteristic...".to_string(),
        ));
        let rx = find_characteristic(&uart.characteristics, self.config.rx_char_uuid)
            .ok_or_else(|| ConnectError::Negotiation("RX characteristic not found".to_string()))?;

        let _ = events.send(SessionEvent::Status(
            "Getting TX characteristic...".to_string(),
        ));
        let tx = find_characteristic(&uart.characteristics, self.config.tx_char_uuid)
            .ok_or_else(|| ConnectError::Negotiation("TX characteristic not found".to_string()))?;

        peripheral.subscribe(&tx).await.map_err(neg)?;

        let device_id = read_system_id(&peripheral).await;

        // Forward notifications until the stream ends (device drop) or the
        // session goes away.
        let mut notifications = peripheral.notifications().await.map_err(neg)?;
        let tx_uuid = self.config.tx_char_uuid;
        let forwarder = events.clone();
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != tx_uuid {
                    continue;
                }
                if forwarder
                    .send(SessionEvent::Inbound(notification.value))
                    .is_err()
                {
                    return;
                }
            }
            let _ = forwarder.send(SessionEvent::Dropped);
        });

        Ok(ConnectedLink {
            device_name: self.name,
            device_id,
            link: Box::new(BleLink { peripheral, rx }),
        })
    }
}

fn find_characteristic(
    characteristics: &std::collections::BTreeSet<Characteristic>,
    uuid: Uuid,
) -> Option<Characteristic> {
    characteristics.iter().find(|c| c.uuid == uuid).cloned()
}

/// Read the Device Information / System ID characteristic, if present.
/// Failure here never fails the connection.
async fn read_system_id(peripheral: &Peripheral) -> Option<String> {
    let dis = peripheral
        .services()
        .into_iter()
        .find(|s| s.uuid == protocol::DEVICE_INFORMATION_SERVICE)?;
    let system_id = find_characteristic(&dis.characteristics, protocol::SYSTEM_ID_CHARACTERISTIC)?;
    match peripheral.read(&system_id).await {
        Ok(raw) => {
            let id = String::from_utf8_lossy(&raw).trim().to_string();
            (!id.is_empty()).then_some(id)
        }
        Err(e) => {
            warn!("System ID read failed: {e}");
            None
        }
    }
}

struct BleLink {
    peripheral: Peripheral,
    rx: Characteristic,
}

#[async_trait]
impl UartLink for BleLink {
    async fn write(&self, payload: &[u8]) -> Result<(), String> {
        let write_type = if self.rx.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(&self.rx, payload, write_type)
            .await
            .map_err(|e| e.to_string())
    }

    async fn close(&self) {
        let _ = self.peripheral.disconnect().await;
    }
}
