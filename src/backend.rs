use crate::config::BackendConfig;
use crate::errors::BackendError;
use crate::models::{FieldUpdate, ProgressRecord};
use crate::storage::LocalTable;
use crate::supabase::SupabaseBackend;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

/// New row images, one per update event. Dropping the stream unsubscribes.
pub type UpdateStream = BoxStream<'static, ProgressRecord>;

/// The progress table: one bulk read, single-field writes and a feed of
/// update events.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    /// All rows ordered by `id` ascending.
    async fn select_all(&self) -> Result<Vec<ProgressRecord>, BackendError>;

    /// Writes one column on every row whose `person` matches. Matching no
    /// row is not an error.
    async fn update_field(&self, update: &FieldUpdate) -> Result<(), BackendError>;

    async fn subscribe(&self) -> Result<UpdateStream, BackendError>;
}

pub async fn open_backend(
    config: &BackendConfig,
    people: &[String],
) -> Result<Arc<dyn ProgressBackend>, BackendError> {
    match config {
        BackendConfig::Local { data_path } => {
            Ok(Arc::new(LocalTable::open(data_path.clone(), people).await?))
        }
        BackendConfig::Supabase(supabase) => Ok(Arc::new(SupabaseBackend::new(supabase.clone())?)),
    }
}
