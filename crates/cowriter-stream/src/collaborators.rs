//! Persistence and notification collaborators injected into the reconciler.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::suggestion::BadgeSuggestion;

/// Key under which the raw final response for a card is stored.
pub fn response_key(card_id: uuid::Uuid) -> String {
    format!("generated_response:{card_id}")
}

/// Key under which the currently selected suggestion for a card is stored.
pub fn selected_suggestion_key(card_id: uuid::Uuid) -> String {
    format!("selected_suggestion:{card_id}")
}

/// Key under which badge and image configuration for a card is stored.
pub fn badge_config_key(card_id: uuid::Uuid) -> String {
    format!("badge_config:{card_id}")
}

/// Key-value persistence for generated responses and selections.
pub trait ResponseStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Typed helpers over [`ResponseStore`] using the card-keyed layout.
pub trait ResponseStoreExt: ResponseStore {
    fn save_final_response(&self, card_id: uuid::Uuid, raw: Value) -> Result<(), StoreError> {
        self.put(&response_key(card_id), raw)
    }

    fn load_final_response(&self, card_id: uuid::Uuid) -> Result<Option<Value>, StoreError> {
        self.get(&response_key(card_id))
    }

    fn save_selected_suggestion(
        &self,
        card_id: uuid::Uuid,
        suggestion: &BadgeSuggestion,
    ) -> Result<(), StoreError> {
        self.put(
            &selected_suggestion_key(card_id),
            serde_json::to_value(suggestion)?,
        )
    }

    fn load_selected_suggestion(
        &self,
        card_id: uuid::Uuid,
    ) -> Result<Option<BadgeSuggestion>, StoreError> {
        self.get(&selected_suggestion_key(card_id))?
            .map(serde_json::from_value::<BadgeSuggestion>)
            .transpose()
            .map_err(StoreError::from)
    }

    fn save_badge_config(&self, card_id: uuid::Uuid, config: Value) -> Result<(), StoreError> {
        self.put(&badge_config_key(card_id), config)
    }

    fn load_badge_config(&self, card_id: uuid::Uuid) -> Result<Option<Value>, StoreError> {
        self.get(&badge_config_key(card_id))
    }
}

impl<T: ResponseStore + ?Sized> ResponseStoreExt for T {}

/// In-process store.
#[derive(Default, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResponseStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk, rewritten on every put.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing entries when the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::Serialization(format!(
                        "store file {} does not hold a JSON object",
                        path.display()
                    )));
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened file store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Map<String, Value>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Io("file store lock poisoned".into()))
    }
}

impl ResponseStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Severity of a user-facing notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

/// Fire-and-forget user-facing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn failure(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                info!(title = %notification.title, description = %notification.description, "notification");
            }
            NotificationKind::Failure => {
                warn!(title = %notification.title, description = %notification.description, "notification");
            }
        }
    }
}
