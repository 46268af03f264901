//! UART terminal protocol definitions.
//!
//! The alarm device exposes the Nordic UART service: one write characteristic
//! ("RX" from the device's point of view) and one notify characteristic
//! ("TX"). A device identifier is read once from the standard Device
//! Information service at pairing time.

use thiserror::Error;
use uuid::Uuid;

/// Nordic UART service UUID
pub const UART_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// RX characteristic UUID - panel writes raw bytes here
pub const UART_RX_CHAR_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// TX characteristic UUID - device notifies inbound data here
pub const UART_TX_CHAR_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Standard Device Information service.
pub const DEVICE_INFORMATION_SERVICE: Uuid =
    Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

/// System ID characteristic within the Device Information service.
pub const SYSTEM_ID_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a23_0000_1000_8000_00805f9b34fb);

/// Parse a UUID string from settings or protocol constants.
pub fn parse_uuid(s: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| anyhow::anyhow!("invalid UUID {s:?}: {e}"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ByteInputError {
    #[error("Please enter comma-separated byte values (0-255).")]
    NoValidBytes,
}

/// Parse comma-separated byte tokens typed into the terminal.
///
/// Tokens that are non-numeric or outside [0, 255] are filtered out; if
/// nothing valid remains the input is rejected and nothing is sent.
pub fn parse_byte_input(input: &str) -> Result<Vec<u8>, ByteInputError> {
    let bytes: Vec<u8> = input
        .split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .filter(|n| (0..=255).contains(n))
        .map(|n| n as u8)
        .collect();

    if bytes.is_empty() {
        return Err(ByteInputError::NoValidBytes);
    }
    Ok(bytes)
}

/// Render an outbound payload the way the terminal logs it: `[255, 0, 128]`.
pub fn format_out_entry(payload: &[u8]) -> String {
    let values: Vec<String> = payload.iter().map(u8::to_string).collect();
    format!("[{}]", values.join(", "))
}
