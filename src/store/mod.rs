//! Contains the participation store, the durable ledger of event rosters.
//!
//! Each event is persisted as one JSON document under the configured data
//! directory. All mutation goes through [`ParticipationStore::update_event`],
//! which serializes concurrent mutators per event id. Mutators for different
//! event ids do not block each other.
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as EventLock;

mod event;

pub use event::{EventRecord, Participant};

pub(crate) type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A requested event could not be found")]
    NotFound,
    #[error("Failed to access an event record: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode an event record: `{0}`")]
    Decode(#[from] serde_json::Error),
}

/// Result of a mutator passed to [`ParticipationStore::update_event`].
///
/// Only `Changed` results are persisted; `Unchanged` leaves the stored
/// record untouched.
pub enum Update<T> {
    Changed(T),
    Unchanged(T),
}

/// Durable key-value mapping of event id to event record.
///
/// Owns its data directory exclusively; the per-event locks make the
/// read-modify-write cycle in [`update_event`](Self::update_event) atomic.
pub struct ParticipationStore {
    data_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<EventLock<()>>>>,
}

impl ParticipationStore {
    /// Opens the store, creating the data directory if necessary.
    pub fn open<P: Into<PathBuf>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.into();

        std::fs::create_dir_all(&data_dir)?;

        Ok(Self {
            data_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Applies `mutate` to the event record under an exclusive per-event lock.
    ///
    /// This is the only way to change an event record. The mutated record is
    /// persisted before the call returns when the mutator reports
    /// [`Update::Changed`]; a mutator error leaves the stored record as it
    /// was. Returns [`StoreError::NotFound`] for unknown event ids.
    pub async fn update_event<T, E, F>(&self, event_id: &str, mutate: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut EventRecord) -> std::result::Result<Update<T>, E>,
        E: From<StoreError>,
    {
        let lock = self.event_lock(event_id);
        let _guard = lock.lock().await;

        let mut record = self.load(event_id).map_err(E::from)?;

        match mutate(&mut record)? {
            Update::Changed(value) => {
                self.persist(&record).map_err(E::from)?;
                Ok(value)
            }
            Update::Unchanged(value) => Ok(value),
        }
    }

    /// Returns a snapshot of the event record
    pub async fn get(&self, event_id: &str) -> Result<EventRecord> {
        let lock = self.event_lock(event_id);
        let _guard = lock.lock().await;

        self.load(event_id)
    }

    /// Writes a new event record.
    ///
    /// Event creation is owned by an external system; this exists for
    /// seeding a data directory and for tests.
    pub async fn insert(&self, record: EventRecord) -> Result<()> {
        let lock = self.event_lock(&record.id);
        let _guard = lock.lock().await;

        self.persist(&record)
    }

    fn event_lock(&self, event_id: &str) -> Arc<EventLock<()>> {
        let mut locks = self.locks.lock();

        locks.entry(event_id.to_owned()).or_default().clone()
    }

    /// Event ids become file names; anything outside `[A-Za-z0-9_-]` is
    /// treated as unknown instead of touching the filesystem.
    fn record_path(&self, event_id: &str) -> Result<PathBuf> {
        let valid = !event_id.is_empty()
            && event_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if !valid {
            return Err(StoreError::NotFound);
        }

        Ok(self.data_dir.join(format!("{event_id}.json")))
    }

    fn load(&self, event_id: &str) -> Result<EventRecord> {
        let path = self.record_path(event_id)?;

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&data)?)
    }

    fn persist(&self, record: &EventRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        let tmp = path.with_extension("json.tmp");

        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &path)?;

        Ok(())
    }
}
