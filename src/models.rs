use crate::i18n::Language;
use crate::streak::{compute_streak_at, parse_completion_dates};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Names of the system categories every user starts with.
pub const DEFAULT_CATEGORY_NAMES: [&str; 6] = [
    "Health",
    "Productivity",
    "Mindfulness",
    "Learning",
    "Fitness",
    "Other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryColor {
    Emerald,
    Blue,
    Purple,
    Yellow,
    Orange,
    Red,
    Pink,
    Cyan,
    #[default]
    Slate,
}

impl CategoryColor {
    /// Unknown color names render as slate.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "emerald" => Self::Emerald,
            "blue" => Self::Blue,
            "purple" => Self::Purple,
            "yellow" => Self::Yellow,
            "orange" => Self::Orange,
            "red" => Self::Red,
            "pink" => Self::Pink,
            "cyan" => Self::Cyan,
            _ => Self::Slate,
        }
    }
}

impl<'de> Deserialize<'de> for CategoryColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: CategoryColor,
    #[serde(default)]
    pub is_default: bool,
}

impl Category {
    /// Stand-in for a habit whose category no longer resolves.
    pub fn unknown(language: Language) -> Self {
        Self {
            id: String::new(),
            name: language.texts().unknown_category.to_string(),
            color: CategoryColor::Slate,
            is_default: false,
        }
    }
}

/// Finds a habit's category by id, falling back to a name match for rows
/// that stored the category name directly.
pub fn resolve_category<'a>(categories: &'a [Category], reference: &str) -> Option<&'a Category> {
    categories
        .iter()
        .find(|category| category.id == reference)
        .or_else(|| categories.iter().find(|category| category.name == reference))
}

/// Default categories first, then alphabetical by name.
pub fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Habit {
    pub id: String,
    pub title: String,
    pub category_id: String,
    pub completed_dates: BTreeSet<NaiveDate>,
    streak: u32,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(
        id: String,
        title: String,
        category_id: String,
        completed_dates: BTreeSet<NaiveDate>,
        created_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Self {
        let streak = compute_streak_at(today, &completed_dates);
        Self {
            id,
            title,
            category_id,
            completed_dates,
            streak,
            created_at,
        }
    }

    pub fn from_row(row: HabitRow, today: NaiveDate) -> Self {
        let dates = parse_completion_dates(
            row.habit_completions
                .iter()
                .map(|completion| completion.completed_at.as_str()),
        );
        Self::new(row.id, row.title, row.category, dates, row.created_at, today)
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }

    /// Adds `date` if absent, removes it if present, and recomputes the
    /// streak. Returns the change that was applied.
    pub fn toggle(&mut self, date: NaiveDate, today: NaiveDate) -> CompletionChange {
        let change = if self.completed_dates.remove(&date) {
            CompletionChange::Removed(date)
        } else {
            self.completed_dates.insert(date);
            CompletionChange::Added(date)
        };
        self.refresh_streak(today);
        change
    }

    pub fn refresh_streak(&mut self, today: NaiveDate) {
        self.streak = compute_streak_at(today, &self.completed_dates);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionChange {
    Added(NaiveDate),
    Removed(NaiveDate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpOutcome {
    pub verification_required: bool,
}

// Wire rows as the data service returns them.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitRow {
    pub id: String,
    pub title: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub habit_completions: Vec<CompletionRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRow {
    pub completed_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HabitDraft {
    pub title: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub color: CategoryColor,
}

// HTTP payloads.

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: Language,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageResponse {
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub goal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitSuggestion {
    #[serde(alias = "habitName")]
    pub habit_name: String,
    pub category: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<UserView>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub label: String,
    pub color: CategoryColor,
    pub is_default: bool,
}

impl CategoryView {
    pub fn new(category: &Category, language: Language) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            label: language.category_label(&category.name, category.is_default),
            color: category.color,
            is_default: category.is_default,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HabitView {
    pub id: String,
    pub title: String,
    pub category: CategoryView,
    pub completed_dates: Vec<NaiveDate>,
    pub streak: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl HabitView {
    pub fn new(habit: &Habit, categories: &[Category], date: NaiveDate, language: Language) -> Self {
        let category = match resolve_category(categories, &habit.category_id) {
            Some(category) => CategoryView::new(category, language),
            None => CategoryView::new(&Category::unknown(language), language),
        };
        Self {
            id: habit.id.clone(),
            title: habit.title.clone(),
            category,
            completed_dates: habit.completed_dates.iter().copied().collect(),
            streak: habit.streak(),
            completed: habit.is_completed_on(date),
            created_at: habit.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HabitListResponse {
    pub date: NaiveDate,
    pub habits: Vec<HabitView>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub completed_count: u32,
    pub total_habits: u32,
}

#[derive(Debug, Serialize)]
pub struct BestDay {
    pub date: NaiveDate,
    pub weekday: String,
    pub completed_count: u32,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub last_7_days: Vec<DayStatus>,
    pub completion_rate: u32,
    pub best_day: Option<BestDay>,
}

#[derive(Debug, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub completed: bool,
    pub future: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub habit_id: String,
    pub month: String,
    pub streak: u32,
    pub days: Vec<HistoryDay>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn category(id: &str, name: &str, is_default: bool) -> Category {
        Category {
            id: id.into(),
            name: name.into(),
            color: CategoryColor::Blue,
            is_default,
        }
    }

    #[test]
    fn unknown_colors_fall_back_to_slate() {
        let parsed: Category =
            serde_json::from_str(r#"{"id":"c1","name":"Odd","color":"mauve","is_default":false}"#)
                .unwrap();
        assert_eq!(parsed.color, CategoryColor::Slate);
    }

    #[test]
    fn categories_resolve_by_id_then_name() {
        let categories = vec![category("c1", "Health", true), category("c2", "Reading", false)];
        assert_eq!(resolve_category(&categories, "c2").unwrap().name, "Reading");
        assert_eq!(resolve_category(&categories, "Health").unwrap().id, "c1");
        assert!(resolve_category(&categories, "gone").is_none());
    }

    #[test]
    fn unresolved_category_renders_placeholder() {
        let habit = Habit::new(
            "h1".into(),
            "Read".into(),
            "deleted".into(),
            BTreeSet::new(),
            Utc::now(),
            today(),
        );
        let view = HabitView::new(&habit, &[], today(), Language::En);
        assert_eq!(view.category.name, "Unknown");
        assert_eq!(view.category.color, CategoryColor::Slate);
    }

    #[test]
    fn sort_puts_defaults_first() {
        let mut categories = vec![
            category("a", "Zen", false),
            category("b", "Learning", true),
            category("c", "Art", false),
            category("d", "Health", true),
        ];
        sort_categories(&mut categories);
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Health", "Learning", "Art", "Zen"]);
    }

    #[test]
    fn toggle_twice_is_identity() {
        let dates = [today(), today() - Duration::days(1)].into_iter().collect();
        let original = Habit::new("h".into(), "Run".into(), "c".into(), dates, Utc::now(), today());
        let mut habit = original.clone();

        let yesterday = today() - Duration::days(1);
        assert_eq!(habit.toggle(yesterday, today()), CompletionChange::Removed(yesterday));
        assert_eq!(habit.streak(), 1);
        assert_eq!(habit.toggle(yesterday, today()), CompletionChange::Added(yesterday));
        assert_eq!(habit, original);
    }

    #[test]
    fn removing_middle_day_breaks_streak() {
        let dates = (0..3).map(|offset| today() - Duration::days(offset)).collect();
        let mut habit = Habit::new("h".into(), "Run".into(), "c".into(), dates, Utc::now(), today());
        assert_eq!(habit.streak(), 3);

        habit.toggle(today() - Duration::days(1), today());
        assert_eq!(habit.streak(), 1);
        assert_eq!(habit.completed_dates.len(), 2);
    }

    #[test]
    fn habit_row_maps_joined_completions() {
        let row: HabitRow = serde_json::from_str(
            r#"{
                "id": "h1",
                "title": "Stretch",
                "category": "c1",
                "created_at": "2026-10-01T08:00:00.123456+00:00",
                "user_id": "u1",
                "habit_completions": [
                    {"completed_at": "2026-10-15"},
                    {"completed_at": "2026-10-14"},
                    {"completed_at": "not-a-date"}
                ]
            }"#,
        )
        .unwrap();
        let habit = Habit::from_row(row, today());
        assert_eq!(habit.completed_dates.len(), 2);
        assert_eq!(habit.streak(), 2);
    }

    #[test]
    fn display_name_prefers_full_name() {
        let mut user = User {
            id: "u".into(),
            email: "ada@example.com".into(),
            full_name: None,
        };
        assert_eq!(user.display_name(), "ada");
        user.full_name = Some("Ada Lovelace".into());
        assert_eq!(user.display_name(), "Ada Lovelace");
    }
}
