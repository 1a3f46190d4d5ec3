use crate::backend::{ProgressBackend, UpdateStream};
use crate::errors::BackendError;
use crate::models::{FieldUpdate, ProgressRecord};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Progress table kept in a JSON file. Every written row is broadcast to
/// all subscribers, the writer's own subscription included.
pub struct LocalTable {
    path: PathBuf,
    rows: Mutex<Vec<ProgressRecord>>,
    events: broadcast::Sender<ProgressRecord>,
}

impl LocalTable {
    /// Opens the table at `path`, seeding one zeroed row per name when the
    /// file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>, people: &[String]) -> Result<Self, BackendError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let rows = match load_rows(&path).await? {
            Some(mut rows) => {
                rows.sort_by_key(|row| row.id);
                rows
            }
            None => {
                let rows = seed_rows(people);
                persist_rows(&path, &rows).await?;
                info!(path = %path.display(), count = rows.len(), "seeded progress table");
                rows
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            path,
            rows: Mutex::new(rows),
            events,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl ProgressBackend for LocalTable {
    async fn select_all(&self) -> Result<Vec<ProgressRecord>, BackendError> {
        Ok(self.rows.lock().await.clone())
    }

    async fn update_field(&self, update: &FieldUpdate) -> Result<(), BackendError> {
        let mut rows = self.rows.lock().await;
        let mut next = rows.clone();
        let mut written = Vec::new();
        for row in next.iter_mut().filter(|row| row.person == update.person) {
            row.set(update.category, update.value);
            written.push(row.clone());
        }

        if written.is_empty() {
            debug!(person = %update.person, "update matched no rows");
            return Ok(());
        }

        persist_rows(&self.path, &next).await?;
        *rows = next;
        drop(rows);

        for row in written {
            // no subscribers is fine
            let _ = self.events.send(row);
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<UpdateStream, BackendError> {
        let receiver = self.events.subscribe();
        let updates = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(row) => return Some((row, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "progress subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(updates.boxed())
    }
}

/// One zeroed row per distinct name, ids from 1.
fn seed_rows(people: &[String]) -> Vec<ProgressRecord> {
    let mut rows: Vec<ProgressRecord> = Vec::with_capacity(people.len());
    for person in people {
        if rows.iter().any(|row| &row.person == person) {
            continue;
        }
        rows.push(ProgressRecord::new(rows.len() as i64 + 1, person.as_str()));
    }
    rows
}

async fn load_rows(path: &Path) -> Result<Option<Vec<ProgressRecord>>, BackendError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn persist_rows(path: &Path, rows: &[ProgressRecord]) -> Result<(), BackendError> {
    let payload = serde_json::to_vec_pretty(rows)?;
    fs::write(path, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use std::time::Duration;
    use tokio::time::timeout;

    fn people(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn open_seeds_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        let table = LocalTable::open(&path, &people(&["A", "B"])).await.unwrap();
        let rows = table.select_all().await.unwrap();
        assert_eq!(rows, vec![ProgressRecord::new(1, "A"), ProgressRecord::new(2, "B")]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn open_reads_existing_rows_ordered_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(
            &path,
            r#"[{"id":5,"person":"B","movies":2,"workouts":0,"match_sets":1},
                {"id":3,"person":"A","movies":9,"workouts":4,"smash_sets":0}]"#,
        )
        .unwrap();

        let table = LocalTable::open(&path, &people(&["ignored"])).await.unwrap();
        let rows = table.select_all().await.unwrap();
        assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(rows[0].movies, 9);
    }

    #[tokio::test]
    async fn open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "not json").unwrap();

        let result = LocalTable::open(&path, &people(&["A"])).await;
        assert!(matches!(result, Err(BackendError::Serde(_))));
    }

    #[tokio::test]
    async fn update_persists_and_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let table = LocalTable::open(&path, &people(&["A", "B"])).await.unwrap();
        let mut updates = table.subscribe().await.unwrap();

        table
            .update_field(&FieldUpdate {
                person: "B".to_string(),
                category: Category::Workouts,
                value: 3,
            })
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(1), updates.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.id, 2);
        assert_eq!(event.workouts, 3);

        let reopened = LocalTable::open(&path, &people(&[])).await.unwrap();
        let rows = reopened.select_all().await.unwrap();
        assert_eq!(rows[1].workouts, 3);
        assert_eq!(rows[0], ProgressRecord::new(1, "A"));
    }

    #[tokio::test]
    async fn update_for_unknown_person_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let table = LocalTable::open(dir.path().join("progress.json"), &people(&["A"]))
            .await
            .unwrap();
        let mut updates = table.subscribe().await.unwrap();

        table
            .update_field(&FieldUpdate {
                person: "C".to_string(),
                category: Category::Movies,
                value: 1,
            })
            .await
            .unwrap();

        assert!(timeout(Duration::from_millis(100), updates.next()).await.is_err());
        assert_eq!(table.select_all().await.unwrap(), vec![ProgressRecord::new(1, "A")]);
    }

    #[tokio::test]
    async fn seeding_skips_repeated_names() {
        let dir = tempfile::tempdir().unwrap();
        let table = LocalTable::open(dir.path().join("progress.json"), &people(&["Ada", "Ada", "Bo"]))
            .await
            .unwrap();
        assert_eq!(
            table.select_all().await.unwrap(),
            vec![ProgressRecord::new(1, "Ada"), ProgressRecord::new(2, "Bo")]
        );

        table
            .update_field(&FieldUpdate {
                person: "Ada".to_string(),
                category: Category::Movies,
                value: 1,
            })
            .await
            .unwrap();
        let rows = table.select_all().await.unwrap();
        assert_eq!(rows[0].movies, 1);
        assert_eq!(rows[1].movies, 0);
    }

    #[tokio::test]
    async fn dropping_stream_releases_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let table = LocalTable::open(dir.path().join("progress.json"), &people(&["A"]))
            .await
            .unwrap();

        let updates = table.subscribe().await.unwrap();
        assert_eq!(table.subscriber_count(), 1);
        drop(updates);
        assert_eq!(table.subscriber_count(), 0);
    }
}
