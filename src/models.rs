use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: i64,
    pub person: String,
    #[serde(default)]
    pub movies: u32,
    #[serde(default)]
    pub workouts: u32,
    #[serde(default, alias = "smash_sets", alias = "matchSets")]
    pub match_sets: u32,
}

impl ProgressRecord {
    pub fn new(id: i64, person: impl Into<String>) -> Self {
        Self {
            id,
            person: person.into(),
            movies: 0,
            workouts: 0,
            match_sets: 0,
        }
    }

    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Movies => self.movies,
            Category::Workouts => self.workouts,
            Category::MatchSets => self.match_sets,
        }
    }

    pub fn set(&mut self, category: Category, value: u32) {
        match category {
            Category::Movies => self.movies = value,
            Category::Workouts => self.workouts = value,
            Category::MatchSets => self.match_sets = value,
        }
    }

    pub fn total(&self) -> u64 {
        Category::ALL
            .iter()
            .map(|category| u64::from(self.get(*category)))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Movies,
    Workouts,
    #[serde(alias = "smash_sets", alias = "matchSets")]
    MatchSets,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Movies, Category::Workouts, Category::MatchSets];

    /// Column name in the progress table.
    pub fn column(self) -> &'static str {
        match self {
            Category::Movies => "movies",
            Category::Workouts => "workouts",
            Category::MatchSets => "match_sets",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Movies => "Movies",
            Category::Workouts => "Workouts",
            Category::MatchSets => "Match sets",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A single-field write targeting the row whose `person` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    pub person: String,
    pub category: Category,
    pub value: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRequest {
    pub person: String,
    pub category: Category,
    pub delta: i32,
}

#[derive(Debug, Serialize)]
pub struct ChangeResponse {
    pub person: String,
    pub category: Category,
    pub value: Option<u32>,
    pub queued: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressMeter {
    pub current: u64,
    pub goal: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub category: Category,
    pub label: &'static str,
    #[serde(flatten)]
    pub meter: ProgressMeter,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonView {
    pub id: i64,
    pub person: String,
    pub categories: Vec<CategoryView>,
    pub total: ProgressMeter,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub generated_at: String,
    pub people: Vec<PersonView>,
}
