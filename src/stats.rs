use crate::models::{
    Category, CategoryView, DashboardView, PersonView, ProgressMeter, ProgressRecord,
};
use chrono::Utc;

pub const MOVIES_GOAL: u32 = 100;
pub const WORKOUTS_GOAL: u32 = 100;
pub const MATCH_SETS_GOAL: u32 = 100;
pub const TOTAL_GOAL: u32 = MOVIES_GOAL + WORKOUTS_GOAL + MATCH_SETS_GOAL;

pub fn goal(category: Category) -> u32 {
    match category {
        Category::Movies => MOVIES_GOAL,
        Category::Workouts => WORKOUTS_GOAL,
        Category::MatchSets => MATCH_SETS_GOAL,
    }
}

/// Share of `goal` reached, rounded to the nearest percent and capped at 100.
pub fn percentage(current: u64, goal: u64) -> u32 {
    if goal == 0 {
        return 100;
    }
    let ratio = (current as f64 / goal as f64) * 100.0;
    ratio.round().min(100.0) as u32
}

pub fn meter(current: u64, goal: u64) -> ProgressMeter {
    ProgressMeter {
        current,
        goal,
        percentage: percentage(current, goal),
    }
}

pub fn build_dashboard(records: &[ProgressRecord]) -> DashboardView {
    let people = records.iter().map(person_view).collect();

    DashboardView {
        generated_at: Utc::now().to_rfc3339(),
        people,
    }
}

fn person_view(record: &ProgressRecord) -> PersonView {
    let categories = Category::ALL
        .iter()
        .map(|category| CategoryView {
            category: *category,
            label: category.label(),
            meter: meter(u64::from(record.get(*category)), u64::from(goal(*category))),
        })
        .collect();

    PersonView {
        id: record.id,
        person: record.person.clone(),
        categories,
        total: meter(record.total(), u64::from(TOTAL_GOAL)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_and_caps() {
        assert_eq!(percentage(0, 100), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(100, 100), 100);
        assert_eq!(percentage(250, 100), 100);
        assert_eq!(percentage(5, 0), 100);
    }

    #[test]
    fn dashboard_total_uses_combined_goal() {
        let record = ProgressRecord {
            id: 1,
            person: "A".to_string(),
            movies: 30,
            workouts: 60,
            match_sets: 0,
        };

        let view = build_dashboard(&[record]);
        assert_eq!(view.people.len(), 1);
        let person = &view.people[0];
        assert_eq!(person.total.current, 90);
        assert_eq!(person.total.goal, 300);
        assert_eq!(person.total.percentage, 30);
        assert_eq!(person.categories.len(), 3);
        assert_eq!(person.categories[1].meter.percentage, 60);
    }

    #[test]
    fn dashboard_caps_overachieving_categories() {
        let record = ProgressRecord {
            id: 7,
            person: "B".to_string(),
            movies: 180,
            workouts: 180,
            match_sets: 180,
        };

        let view = build_dashboard(&[record]);
        let person = &view.people[0];
        assert!(person.categories.iter().all(|c| c.meter.percentage == 100));
        assert_eq!(person.total.percentage, 100);
        assert_eq!(person.categories[0].meter.current, 180);
    }
}
