//! Alarm directory: CRUD over the alarm collection in the remote datastore,
//! plus the one-shot global stop command.
//!
//! The store is authoritative. Mutations are fire-and-forget: each reports
//! its outcome through the notification sink and never touches the local
//! view. Callers see changes only through the live subscription, so the
//! list always reflects confirmed remote state.

use crate::domain::alarm::{Alarm, AlarmRecord, AlarmValidationError};
use crate::domain::models::{Notifier, StatusMessage};
use crate::infrastructure::datastore::{Datastore, DatastoreError, DevicePaths};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Device ID cannot be empty")]
    EmptyDeviceId,
}

pub struct AlarmDirectory {
    store: Arc<dyn Datastore>,
    paths: DevicePaths,
    notifier: Notifier,
}

impl AlarmDirectory {
    pub fn new(
        store: Arc<dyn Datastore>,
        device_id: &str,
        notifier: Notifier,
    ) -> Result<Self, DirectoryError> {
        if device_id.trim().is_empty() {
            return Err(DirectoryError::EmptyDeviceId);
        }
        Ok(Self {
            store,
            paths: DevicePaths::new(device_id.trim()),
            notifier,
        })
    }

    /// Store a new alarm under a generated key. Validation errors surface to
    /// the caller (inline form errors); store failures only raise a
    /// notification.
    pub async fn add_alarm(&self, record: AlarmRecord) -> Result<(), AlarmValidationError> {
        record.validate()?;
        match self
            .store
            .push(&self.paths.alarms(), to_stored_value(&record))
            .await
        {
            Ok(_key) => self.notify_success("Alarm Added. Your new alarm has been set."),
            Err(e) => {
                error!("Failed to add alarm: {e}");
                self.notify_error("Failed to add new alarm.");
            }
        }
        Ok(())
    }

    /// Replace the fields of an existing alarm.
    pub async fn update_alarm(
        &self,
        id: &str,
        record: AlarmRecord,
    ) -> Result<(), AlarmValidationError> {
        record.validate()?;
        match self.store.update(&self.paths.alarm(id), to_fields(&record)).await {
            Ok(()) => self.notify_success("Alarm Updated. Your alarm has been successfully updated."),
            Err(e) => {
                error!("Failed to update alarm: {e}");
                self.notify_error("Failed to update alarm.");
            }
        }
        Ok(())
    }

    pub async fn delete_alarm(&self, id: &str) {
        match self.store.remove(&self.paths.alarm(id)).await {
            Ok(()) => self.notify_success("Alarm Deleted. The alarm has been removed."),
            Err(e) => {
                error!("Failed to delete alarm: {e}");
                self.notify_error("Failed to delete alarm.");
            }
        }
    }

    /// Flip only the `enabled` field. Silent on success for a smoother flow;
    /// failures still notify.
    pub async fn toggle_alarm(&self, id: &str, enabled: bool) {
        let mut fields = serde_json::Map::new();
        fields.insert("enabled".to_string(), json!(enabled));
        if let Err(e) = self.store.update(&self.paths.alarm(id), fields).await {
            error!("Failed to toggle alarm: {e}");
            self.notify_error("Failed to toggle alarm.");
        }
    }

    /// One-shot stop command; the device observes and clears the flag.
    pub async fn trigger_stop_alarm(&self) {
        match self.store.set(&self.paths.stop_command(), json!(true)).await {
            Ok(()) => self.notify_success("Command Sent. Stop alarm command sent to ESP32."),
            Err(e) => {
                error!("Failed to send stop command: {e}");
                self.notify_error("Failed to send stop command.");
            }
        }
    }

    /// Live view of the alarm list, sorted by record key. The receiver
    /// always holds the latest confirmed snapshot.
    pub async fn subscribe(&self) -> Result<watch::Receiver<Vec<Alarm>>, DatastoreError> {
        let mut snapshots = self.store.subscribe(&self.paths.alarms()).await?;
        let initial = parse_snapshot(snapshots.borrow_and_update().clone());
        let (sender, receiver) = watch::channel(initial);

        tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let alarms = parse_snapshot(snapshots.borrow_and_update().clone());
                if sender.send(alarms).is_err() {
                    return;
                }
            }
        });

        Ok(receiver)
    }

    fn notify_success(&self, message: &str) {
        let _ = self.notifier.send(StatusMessage::success(message));
    }

    fn notify_error(&self, message: &str) {
        let _ = self.notifier.send(StatusMessage::error(message));
    }
}

/// An alarm record is a plain struct and always serializes to an object;
/// the fallback empty map keeps the write harmless either way.
fn to_fields(record: &AlarmRecord) -> serde_json::Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields,
        _ => serde_json::Map::new(),
    }
}

fn to_stored_value(record: &AlarmRecord) -> Value {
    Value::Object(to_fields(record))
}

/// Map one subtree snapshot to the alarm list. Records that fail to parse
/// are skipped rather than poisoning the whole view.
fn parse_snapshot(snapshot: Option<Value>) -> Vec<Alarm> {
    let Some(Value::Object(entries)) = snapshot else {
        return Vec::new();
    };
    let mut alarms: Vec<Alarm> = entries
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value(value) {
            Ok(record) => Some(Alarm { id, record }),
            Err(e) => {
                warn!("Skipping malformed alarm record {id}: {e}");
                None
            }
        })
        .collect();
    alarms.sort_by(|a, b| a.id.cmp(&b.id));
    alarms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alarm::RepeatDays;
    use crate::domain::models::MessageSeverity;
    use crate::infrastructure::datastore::MemoryDatastore;
    use async_trait::async_trait;
    use serde_json::Map;
    use tokio::sync::mpsc;

    fn record() -> AlarmRecord {
        AlarmRecord {
            time: "06:30".to_string(),
            label: "Work".to_string(),
            repeat: RepeatDays {
                mon: true,
                tue: true,
                wed: true,
                thu: true,
                fri: true,
                ..RepeatDays::default()
            },
            enabled: true,
            wake_up_game: true,
        }
    }

    fn directory(
        store: Arc<dyn Datastore>,
    ) -> (AlarmDirectory, mpsc::UnboundedReceiver<StatusMessage>) {
        let (notifier, toasts) = mpsc::unbounded_channel();
        let dir = AlarmDirectory::new(store, "test-device-123", notifier).unwrap();
        (dir, toasts)
    }

    #[tokio::test]
    async fn added_alarm_round_trips_through_the_subscription() {
        let store = MemoryDatastore::new_shared();
        let (dir, _toasts) = directory(store);

        let submitted = record();
        dir.add_alarm(submitted.clone()).await.unwrap();

        let mut view = dir.subscribe().await.unwrap();
        let alarms = view.borrow_and_update().clone();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].record, submitted);
        assert!(!alarms[0].id.is_empty());
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_original_enabled_flag() {
        let store = MemoryDatastore::new_shared();
        let (dir, _toasts) = directory(store);
        dir.add_alarm(record()).await.unwrap();

        let mut view = dir.subscribe().await.unwrap();
        let id = view.borrow_and_update()[0].id.clone();

        dir.toggle_alarm(&id, false).await;
        view.changed().await.unwrap();
        assert!(!view.borrow_and_update()[0].record.enabled);

        dir.toggle_alarm(&id, true).await;
        view.changed().await.unwrap();
        let alarms = view.borrow_and_update().clone();
        assert!(alarms[0].record.enabled);
        // Nothing but the flag moved.
        assert_eq!(alarms[0].record, record());
    }

    #[tokio::test]
    async fn update_replaces_fields_and_delete_removes_the_record() {
        let store = MemoryDatastore::new_shared();
        let (dir, _toasts) = directory(store);
        dir.add_alarm(record()).await.unwrap();

        let mut view = dir.subscribe().await.unwrap();
        let id = view.borrow_and_update()[0].id.clone();

        let mut changed = record();
        changed.time = "07:45".to_string();
        changed.label = "Gym".to_string();
        dir.update_alarm(&id, changed.clone()).await.unwrap();
        view.changed().await.unwrap();
        assert_eq!(view.borrow_and_update()[0].record, changed);

        dir.delete_alarm(&id).await;
        view.changed().await.unwrap();
        assert!(view.borrow_and_update().is_empty());
    }

    #[tokio::test]
    async fn stop_command_sets_the_one_shot_flag() {
        let store = MemoryDatastore::new_shared();
        let (dir, mut toasts) = directory(store.clone());

        dir.trigger_stop_alarm().await;

        assert_eq!(
            store
                .get("devices/test-device-123/commands/stopAlarm")
                .await
                .unwrap(),
            Some(json!(true))
        );
        assert_eq!(toasts.recv().await.unwrap().severity, MessageSeverity::Success);
    }

    #[tokio::test]
    async fn malformed_time_is_an_inline_error_and_never_reaches_the_store() {
        let store = MemoryDatastore::new_shared();
        let (dir, mut toasts) = directory(store.clone());

        let mut bad = record();
        bad.time = "25:00".to_string();
        assert!(dir.add_alarm(bad).await.is_err());

        assert_eq!(store.get("devices/test-device-123/alarms").await.unwrap(), None);
        assert!(toasts.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_device_id_is_rejected() {
        let store = MemoryDatastore::new_shared();
        let (notifier, _toasts) = mpsc::unbounded_channel();
        assert_eq!(
            AlarmDirectory::new(store, "  ", notifier).err(),
            Some(DirectoryError::EmptyDeviceId)
        );
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_by_the_view() {
        let store = MemoryDatastore::new_shared();
        let (dir, _toasts) = directory(store.clone());
        dir.add_alarm(record()).await.unwrap();
        store
            .set("devices/test-device-123/alarms/broken", json!("not an alarm"))
            .await
            .unwrap();

        let mut view = dir.subscribe().await.unwrap();
        assert_eq!(view.borrow_and_update().len(), 1);
    }

    /// Store stub whose writes always fail.
    struct FailingStore;

    #[async_trait]
    impl Datastore for FailingStore {
        async fn get(&self, _: &str) -> Result<Option<Value>, DatastoreError> {
            Err(DatastoreError::Backend("offline".to_string()))
        }
        async fn set(&self, _: &str, _: Value) -> Result<(), DatastoreError> {
            Err(DatastoreError::Backend("offline".to_string()))
        }
        async fn update(&self, _: &str, _: Map<String, Value>) -> Result<(), DatastoreError> {
            Err(DatastoreError::Backend("offline".to_string()))
        }
        async fn remove(&self, _: &str) -> Result<(), DatastoreError> {
            Err(DatastoreError::Backend("offline".to_string()))
        }
        async fn push(&self, _: &str, _: Value) -> Result<String, DatastoreError> {
            Err(DatastoreError::Backend("offline".to_string()))
        }
        async fn subscribe(
            &self,
            _: &str,
        ) -> Result<watch::Receiver<Option<Value>>, DatastoreError> {
            Err(DatastoreError::Backend("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failures_notify_instead_of_propagating() {
        let (dir, mut toasts) = directory(Arc::new(FailingStore));

        dir.add_alarm(record()).await.unwrap();
        assert_eq!(toasts.recv().await.unwrap().severity, MessageSeverity::Error);

        dir.toggle_alarm("a1", false).await;
        assert_eq!(toasts.recv().await.unwrap().severity, MessageSeverity::Error);

        dir.delete_alarm("a1").await;
        assert_eq!(toasts.recv().await.unwrap().severity, MessageSeverity::Error);

        dir.trigger_stop_alarm().await;
        assert_eq!(toasts.recv().await.unwrap().severity, MessageSeverity::Error);
    }
}
