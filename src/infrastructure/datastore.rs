//! Realtime datastore seam.
//!
//! The alarm device and this panel share a path-addressed JSON tree:
//!
//! ```text
//! devices/{deviceId}/alarms/{alarmId} = { time, label, repeat, enabled, wakeUpGame }
//! devices/{deviceId}/commands/stopAlarm = bool
//! ```
//!
//! The managed remote backend is an external collaborator; everything in this
//! crate talks to it through [`Datastore`]. [`MemoryDatastore`] implements the
//! same contract in-process and backs the tests and local runs.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("datastore path must not be empty")]
    EmptyPath,
    #[error("cannot descend into non-object value at {0}")]
    NotAnObject(String),
    #[error("datastore backend error: {0}")]
    Backend(String),
}

/// Path-addressed tree store with live subtree subscriptions.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, DatastoreError>;

    async fn set(&self, path: &str, value: Value) -> Result<(), DatastoreError>;

    /// Shallow field merge into the object at `path`, creating it if absent.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), DatastoreError>;

    async fn remove(&self, path: &str) -> Result<(), DatastoreError>;

    /// Store `value` under a backend-generated key below `path`; returns the
    /// key.
    async fn push(&self, path: &str, value: Value) -> Result<String, DatastoreError>;

    /// Subscribe to the subtree at `path`. The receiver always holds the
    /// latest snapshot; intermediate snapshots may be superseded unseen.
    async fn subscribe(&self, path: &str)
        -> Result<watch::Receiver<Option<Value>>, DatastoreError>;
}

/// Tree addresses for one device, per the shared layout.
#[derive(Debug, Clone)]
pub struct DevicePaths {
    device_id: String,
}

impl DevicePaths {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn alarms(&self) -> String {
        format!("devices/{}/alarms", self.device_id)
    }

    pub fn alarm(&self, alarm_id: &str) -> String {
        format!("devices/{}/alarms/{}", self.device_id, alarm_id)
    }

    pub fn stop_command(&self) -> String {
        format!("devices/{}/commands/stopAlarm", self.device_id)
    }
}

/// True when one path is a prefix of the other, i.e. one subtree contains
/// the other.
fn paths_overlap(a: &[String], b: &[&str]) -> bool {
    a.iter()
        .map(String::as_str)
        .zip(b.iter().copied())
        .all(|(x, y)| x == y)
}

fn split_path(path: &str) -> Result<Vec<&str>, DatastoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(DatastoreError::EmptyPath);
    }
    Ok(segments)
}

struct Subscription {
    segments: Vec<String>,
    sender: watch::Sender<Option<Value>>,
}

/// In-process [`Datastore`] over a JSON object tree.
#[derive(Default)]
pub struct MemoryDatastore {
    root: RwLock<Map<String, Value>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lookup<'a>(root: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
        let (first, rest) = segments.split_first()?;
        let mut current = root.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    /// Walk to the parent object of the final segment, creating intermediate
    /// objects on the way. Fails if a non-object sits on the path.
    fn parent_object<'a>(
        root: &'a mut Map<String, Value>,
        segments: &[&str],
    ) -> Result<&'a mut Map<String, Value>, DatastoreError> {
        let mut current = root;
        for segment in &segments[..segments.len() - 1] {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = slot
                .as_object_mut()
                .ok_or_else(|| DatastoreError::NotAnObject(segment.to_string()))?;
        }
        Ok(current)
    }

    /// Push the current snapshot to every live subscriber whose path covers
    /// the mutation: either the subscribed subtree contains the mutated
    /// location or an ancestor of it was rewritten. Closed subscriptions are
    /// pruned as they are found.
    async fn notify(&self, mutated: &[&str]) {
        let root = self.root.read().await;
        let mut subs = self.subscriptions.lock().await;
        subs.retain(|sub| {
            if sub.sender.is_closed() {
                return false;
            }
            if !paths_overlap(&sub.segments, mutated) {
                return true;
            }
            let segments: Vec<&str> = sub.segments.iter().map(String::as_str).collect();
            let snapshot = Self::lookup(&root, &segments).cloned();
            sub.sender.send_replace(snapshot);
            true
        });
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, path: &str) -> Result<Option<Value>, DatastoreError> {
        let segments = split_path(path)?;
        let root = self.root.read().await;
        Ok(Self::lookup(&root, &segments).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), DatastoreError> {
        let segments = split_path(path)?;
        {
            let mut root = self.root.write().await;
            let parent = Self::parent_object(&mut root, &segments)?;
            parent.insert(segments[segments.len() - 1].to_string(), value);
        }
        self.notify(&segments).await;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), DatastoreError> {
        let segments = split_path(path)?;
        {
            let mut root = self.root.write().await;
            let parent = Self::parent_object(&mut root, &segments)?;
            let key = segments[segments.len() - 1];
            let slot = parent
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            let target = slot
                .as_object_mut()
                .ok_or_else(|| DatastoreError::NotAnObject(key.to_string()))?;
            for (name, value) in fields {
                target.insert(name, value);
            }
        }
        self.notify(&segments).await;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), DatastoreError> {
        let segments = split_path(path)?;
        {
            let mut root = self.root.write().await;
            let parent = Self::parent_object(&mut root, &segments)?;
            parent.remove(segments[segments.len() - 1]);
        }
        self.notify(&segments).await;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, DatastoreError> {
        let key = Uuid::new_v4().to_string();
        self.set(&format!("{path}/{key}"), value).await?;
        Ok(key)
    }

    async fn subscribe(
        &self,
        path: &str,
    ) -> Result<watch::Receiver<Option<Value>>, DatastoreError> {
        let segments = split_path(path)?;
        let snapshot = {
            let root = self.root.read().await;
            Self::lookup(&root, &segments).cloned()
        };
        let (sender, receiver) = watch::channel(snapshot);
        self.subscriptions.lock().await.push(Subscription {
            segments: segments.into_iter().map(str::to_string).collect(),
            sender,
        });
        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryDatastore::new();
        store
            .set("devices/d1/commands/stopAlarm", json!(true))
            .await
            .unwrap();
        assert_eq!(
            store.get("devices/d1/commands/stopAlarm").await.unwrap(),
            Some(json!(true))
        );
        assert_eq!(store.get("devices/d1/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn push_generates_distinct_keys_under_the_path() {
        let store = MemoryDatastore::new();
        let a = store.push("devices/d1/alarms", json!({"n": 1})).await.unwrap();
        let b = store.push("devices/d1/alarms", json!({"n": 2})).await.unwrap();
        assert_ne!(a, b);

        let subtree = store.get("devices/d1/alarms").await.unwrap().unwrap();
        let map = subtree.as_object().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&a], json!({"n": 1}));
        assert_eq!(map[&b], json!({"n": 2}));
    }

    #[tokio::test]
    async fn update_merges_only_the_given_fields() {
        let store = MemoryDatastore::new();
        store
            .set("devices/d1/alarms/a1", json!({"enabled": true, "label": "Work"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("enabled".to_string(), json!(false));
        store.update("devices/d1/alarms/a1", fields).await.unwrap();

        assert_eq!(
            store.get("devices/d1/alarms/a1").await.unwrap(),
            Some(json!({"enabled": false, "label": "Work"}))
        );
    }

    #[tokio::test]
    async fn remove_deletes_the_record() {
        let store = MemoryDatastore::new();
        store.set("devices/d1/alarms/a1", json!({"n": 1})).await.unwrap();
        store.remove("devices/d1/alarms/a1").await.unwrap();
        assert_eq!(store.get("devices/d1/alarms/a1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscription_tracks_the_latest_snapshot() {
        let store = MemoryDatastore::new();
        let mut rx = store.subscribe("devices/d1/alarms").await.unwrap();
        assert_eq!(*rx.borrow(), None);

        store.set("devices/d1/alarms/a1", json!({"n": 1})).await.unwrap();
        store.set("devices/d1/alarms/a2", json!({"n": 2})).await.unwrap();

        // Two writes, one observation: only the latest snapshot matters.
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone().unwrap();
        assert_eq!(snapshot.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn writes_outside_the_subscribed_subtree_do_not_wake_the_receiver() {
        let store = MemoryDatastore::new();
        let mut rx = store.subscribe("devices/d1/alarms").await.unwrap();
        rx.borrow_and_update();

        store.set("devices/d2/alarms/a1", json!({"n": 1})).await.unwrap();
        assert!(!rx.has_changed().unwrap());

        store.set("devices/d1/alarms/a1", json!({"n": 1})).await.unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        // Rewriting an ancestor replaces the subscribed subtree too.
        store
            .set("devices/d1", json!({"alarms": {"a2": {"n": 2}}}))
            .await
            .unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone().unwrap();
        assert_eq!(snapshot, json!({"a2": {"n": 2}}));
    }

    #[tokio::test]
    async fn descending_into_a_scalar_is_an_error() {
        let store = MemoryDatastore::new();
        store.set("devices/d1/flag", json!(true)).await.unwrap();
        let err = store.set("devices/d1/flag/nested", json!(1)).await;
        assert!(matches!(err, Err(DatastoreError::NotAnObject(_))));
    }

    #[test]
    fn device_paths_match_the_shared_layout() {
        let paths = DevicePaths::new("test-device-123");
        assert_eq!(paths.alarms(), "devices/test-device-123/alarms");
        assert_eq!(paths.alarm("a1"), "devices/test-device-123/alarms/a1");
        assert_eq!(
            paths.stop_command(),
            "devices/test-device-123/commands/stopAlarm"
        );
    }
}
