use crate::sync::ProgressSync;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub title: Arc<str>,
    pub sync: Arc<ProgressSync>,
}

impl AppState {
    pub fn new(title: impl Into<Arc<str>>, sync: Arc<ProgressSync>) -> Self {
        Self {
            title: title.into(),
            sync,
        }
    }
}
