use crate::errors::ConfigError;
use std::{env, path::PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/progress.json";
const DEFAULT_PEOPLE: &str = "Emil,Jørgen";
const DEFAULT_TITLE: &str = "Challenge 2026";
const DEFAULT_MATCH_SETS_COLUMN: &str = "smash_sets";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub title: String,
    pub people: Vec<String>,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    Local { data_path: PathBuf },
    Supabase(SupabaseConfig),
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub schema: String,
    pub table: String,
    /// Column holding the match sets counter.
    pub match_sets_column: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let title = lookup("APP_TITLE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let people = parse_people(&lookup("PROGRESS_PEOPLE").unwrap_or_else(|| DEFAULT_PEOPLE.to_string()));

        let kind = lookup("PROGRESS_BACKEND").unwrap_or_else(|| "local".to_string());
        let backend = match kind.trim() {
            "" | "local" => BackendConfig::Local {
                data_path: lookup("APP_DATA_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            },
            "supabase" => BackendConfig::Supabase(SupabaseConfig {
                url: lookup("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                api_key: lookup("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
                schema: lookup("SUPABASE_SCHEMA").unwrap_or_else(|| "public".to_string()),
                table: lookup("PROGRESS_TABLE").unwrap_or_else(|| "progress".to_string()),
                match_sets_column: lookup("PROGRESS_MATCH_SETS_COLUMN")
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MATCH_SETS_COLUMN.to_string()),
            }),
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        Ok(Self {
            port,
            title,
            people,
            backend,
        })
    }
}

/// Comma separated names, trimmed, first occurrence kept. Names key writes,
/// so they must be unique.
fn parse_people(raw: &str) -> Vec<String> {
    let mut people: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if people.iter().any(|seen| seen == name) {
            warn!(name, "ignoring duplicate name in PROGRESS_PEOPLE");
            continue;
        }
        people.push(name.to_string());
    }
    people
}
