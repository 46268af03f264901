//! Control panel core for a remote ESP32 alarm device.
//!
//! Three independent pieces: an [`AlarmDirectory`] over a realtime datastore,
//! a Bluetooth UART [`TerminalSession`], and the [`WakeUpGame`] challenge
//! that gates stopping a ringing alarm. Presentation is left to the caller;
//! every component reports through log entries and a notification sink.

pub mod directory;
pub mod domain;
pub mod infrastructure;

pub use directory::AlarmDirectory;
pub use domain::alarm::{format_repeat_days, Alarm, AlarmRecord, RepeatDays};
pub use domain::game::{GameColor, GamePhase, PlaybackCue, TapOutcome, WakeUpGame};
pub use domain::models::{ConnectionStatus, LogDirection, LogEntry, Notifier, StatusMessage};
pub use domain::settings::{Settings, SettingsService};
pub use infrastructure::bluetooth::{BleConnector, TerminalConfig, TerminalSession};
pub use infrastructure::datastore::{Datastore, DevicePaths, MemoryDatastore};
