pub mod app;
pub mod backend;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod stats;
pub mod storage;
pub mod supabase;
pub mod sync;
pub mod ui;
pub mod state;

pub use app::router;
pub use backend::{open_backend, ProgressBackend};
pub use config::Config;
pub use state::AppState;
pub use sync::ProgressSync;
