use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "alarm_panel".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Persisted panel preferences. The stop-button flag and last device id are
/// local UI state only; alarm data itself always lives in the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub show_stop_button: bool,
    #[serde(default)]
    pub last_device_id: Option<String>,

    #[serde(default)]
    pub log_settings: LogSettings,

    // Advanced BLE settings, normally left at the Nordic UART defaults.
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_rx_uuid")]
    pub ble_rx_char_uuid: String,
    #[serde(default = "default_tx_uuid")]
    pub ble_tx_char_uuid: String,
    #[serde(default = "default_scan_window_secs")]
    pub scan_window_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_stop_button: default_true(),
            last_device_id: None,
            log_settings: LogSettings::default(),
            ble_service_uuid: default_service_uuid(),
            ble_rx_char_uuid: default_rx_uuid(),
            ble_tx_char_uuid: default_tx_uuid(),
            scan_window_secs: default_scan_window_secs(),
        }
    }
}

fn default_service_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::UART_SERVICE_UUID.to_string()
}
fn default_rx_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::UART_RX_CHAR_UUID.to_string()
}
fn default_tx_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::UART_TX_CHAR_UUID.to_string()
}
fn default_scan_window_secs() -> u64 {
    5
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("ESP32AlarmPanel");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn set_show_stop_button(&mut self, show: bool) -> anyhow::Result<()> {
        self.settings.show_stop_button = show;
        self.save()
    }

    pub fn set_last_device_id(&mut self, device_id: Option<String>) -> anyhow::Result<()> {
        self.settings.last_device_id = device_id;
        self.save()
    }
}
