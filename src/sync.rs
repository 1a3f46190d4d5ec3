//! Local mirror of the progress table.
//!
//! Local state only ever changes through [`ProgressSync::load`] and update
//! events arriving on the subscription. Changes requested through
//! [`ProgressSync::change`] are written to the table and become visible when
//! the table echoes them back, so every viewer shows the same confirmed
//! values.

use crate::backend::ProgressBackend;
use crate::models::{Category, FieldUpdate, ProgressRecord};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct ProgressSync {
    backend: Arc<dyn ProgressBackend>,
    records: Arc<watch::Sender<Vec<ProgressRecord>>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressSync {
    pub fn new(backend: Arc<dyn ProgressBackend>) -> Self {
        let (records, _) = watch::channel(Vec::new());
        Self {
            backend,
            records: Arc::new(records),
            subscription: Mutex::new(None),
        }
    }

    /// Loads every record, then keeps them current from the update feed.
    pub async fn start(backend: Arc<dyn ProgressBackend>) -> Self {
        let sync = Self::new(backend);
        sync.load().await;
        sync.subscribe().await;
        sync
    }

    /// Replaces local state with a fresh read. A failed read keeps what was
    /// there before.
    pub async fn load(&self) {
        match self.backend.select_all().await {
            Ok(rows) => {
                info!(count = rows.len(), "loaded progress records");
                self.records.send_replace(rows);
            }
            Err(err) => warn!("failed to load progress records: {err}"),
        }
    }

    /// Opens the update feed, replacing any previous subscription.
    pub async fn subscribe(&self) {
        let mut updates = match self.backend.subscribe().await {
            Ok(updates) => updates,
            Err(err) => {
                error!("failed to subscribe to progress updates: {err}");
                return;
            }
        };

        let records = Arc::clone(&self.records);
        let task = tokio::spawn(async move {
            while let Some(record) = updates.next().await {
                let id = record.id;
                let applied = records.send_if_modified(|current| apply_update(current, record));
                if !applied {
                    debug!(id, "ignored update for unknown record");
                }
            }
            info!("progress update feed ended");
        });

        if let Some(previous) = self.subscription.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// Requests `delta` on one counter. Returns the write that was sent, or
    /// `None` when `person` is not in local state. The write's outcome is
    /// only logged.
    pub fn change(&self, person: &str, category: Category, delta: i32) -> Option<FieldUpdate> {
        let update = plan_change(&self.records.borrow(), person, category, delta);
        let Some(update) = update else {
            debug!(person, %category, "change ignored, person not loaded");
            return None;
        };

        let backend = Arc::clone(&self.backend);
        let write = update.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.update_field(&write).await {
                warn!(person = %write.person, category = %write.category, "progress write failed: {err}");
            }
        });

        Some(update)
    }

    pub fn records(&self) -> Vec<ProgressRecord> {
        self.records.borrow().clone()
    }

    /// Receiver notified after every load or applied update.
    pub fn watch(&self) -> watch::Receiver<Vec<ProgressRecord>> {
        self.records.subscribe()
    }

    /// Tears down the update feed. Writes already sent still complete.
    pub async fn shutdown(&self) {
        if let Some(task) = self.subscription.lock().await.take() {
            task.abort();
            info!("progress subscription closed");
        }
    }
}

impl Drop for ProgressSync {
    fn drop(&mut self) {
        if let Some(task) = self.subscription.get_mut().take() {
            task.abort();
        }
    }
}

/// `current + delta`, floored at zero.
pub fn clamp_counter(current: u32, delta: i32) -> u32 {
    let next = i64::from(current) + i64::from(delta);
    next.clamp(0, i64::from(u32::MAX)) as u32
}

pub fn plan_change(
    records: &[ProgressRecord],
    person: &str,
    category: Category,
    delta: i32,
) -> Option<FieldUpdate> {
    let record = records.iter().find(|record| record.person == person)?;
    Some(FieldUpdate {
        person: person.to_string(),
        category,
        value: clamp_counter(record.get(category), delta),
    })
}

/// Replaces the record with the same `id`. Returns false, leaving
/// `records` untouched, when no record matches.
pub fn apply_update(records: &mut [ProgressRecord], update: ProgressRecord) -> bool {
    match records.iter_mut().find(|record| record.id == update.id) {
        Some(slot) => {
            *slot = update;
            true
        }
        None => false,
    }
}
