//! Console Bluetooth terminal for the ESP32 alarm device.
//!
//! Thin glue over the library: connect to the UART service, type
//! comma-separated byte values to send, watch notifications come back.

use anyhow::Result;
use esp32_alarm_panel::domain::models::{LogDirection, LogEntry, MessageSeverity, StatusMessage};
use esp32_alarm_panel::domain::settings::SettingsService;
use esp32_alarm_panel::infrastructure::bluetooth::protocol;
use esp32_alarm_panel::infrastructure::logging;
use esp32_alarm_panel::{BleConnector, TerminalConfig, TerminalSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

enum Step {
    Line(Option<String>),
    LinkEvent,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut settings = SettingsService::new()?;
    let _logging = logging::init_logger(&settings.get().log_settings)?;
    info!("Starting ESP32 alarm panel terminal");

    let config = TerminalConfig::from_settings(settings.get())?;
    let connector = BleConnector::new(config);

    let (notifier, mut toasts) = mpsc::unbounded_channel::<StatusMessage>();
    let mut session = TerminalSession::new(notifier);

    println!("ESP32 alarm panel terminal");
    println!("/connect  /disconnect  /clear  /quit  - anything else is sent as bytes, e.g. 255, 0, 128");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut echoed = 0usize;

    loop {
        let step = tokio::select! {
            line = lines.next_line() => Step::Line(line?),
            _ = session.next_event() => Step::LinkEvent,
        };

        match step {
            Step::LinkEvent => {}
            Step::Line(None) => break,
            Step::Line(Some(line)) => match line.trim() {
                "" => {}
                "/quit" => break,
                "/connect" => {
                    session.connect(&connector).await;
                    // Remember the device identifier read at pairing time.
                    if let Some(id) = session.device_id() {
                        if settings.get().last_device_id.as_deref() != Some(id) {
                            let id = id.to_string();
                            if let Err(e) = settings.set_last_device_id(Some(id)) {
                                warn!("Could not persist device id: {e}");
                            }
                        }
                    }
                }
                "/disconnect" => session.disconnect().await,
                "/clear" => {
                    session.clear_logs();
                    echoed = 0;
                }
                input => {
                    if !session.is_connected() {
                        eprintln!("Connect to a device before sending data.");
                    } else {
                        match protocol::parse_byte_input(input) {
                            Ok(bytes) => session.send(&bytes).await,
                            Err(e) => eprintln!("{e}"),
                        }
                    }
                }
            },
        }

        session.pump_events();
        echoed = echo_new_entries(session.logs(), echoed);
        while let Ok(toast) = toasts.try_recv() {
            print_toast(&toast);
        }
    }

    session.disconnect().await;
    Ok(())
}

fn echo_new_entries(logs: &[LogEntry], echoed: usize) -> usize {
    for entry in &logs[echoed..] {
        let prefix = match entry.direction {
            LogDirection::In => "> ",
            LogDirection::Out => "< ",
            LogDirection::Status => "",
        };
        println!("{prefix}{}", entry.message);
    }
    logs.len()
}

fn print_toast(toast: &StatusMessage) {
    let tag = match toast.severity {
        MessageSeverity::Info => "info",
        MessageSeverity::Success => "ok",
        MessageSeverity::Warning => "warn",
        MessageSeverity::Error => "error",
    };
    eprintln!("[{tag}] {}", toast.message);
}
