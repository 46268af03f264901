//! Bluetooth terminal stack.
//!
//! - [`protocol`] - UART/Device Information UUIDs and byte-input parsing
//! - [`connector`] - device discovery and GATT negotiation (btleplug)
//! - [`session`] - the terminal session state machine

pub mod connector;
pub mod protocol;
pub mod session;

pub use connector::{BleConnector, TerminalConfig, UartConnector};
pub use session::TerminalSession;
