use crate::models::{Habit, HistoryDay, HistoryResponse};
use chrono::{Datelike, NaiveDate};

/// Parses a `YYYY-MM` month selector into its first day.
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    let (year, month) = value.trim().split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Calendar of one month of a habit's completions.
pub fn month_history(habit: &Habit, month: NaiveDate, today: NaiveDate) -> HistoryResponse {
    let first = month.with_day(1).unwrap_or(month);
    let days = first
        .iter_days()
        .take_while(|date| date.month() == first.month())
        .map(|date| HistoryDay {
            date,
            completed: habit.is_completed_on(date),
            future: date > today,
        })
        .collect();

    HistoryResponse {
        habit_id: habit.id.clone(),
        month: first.format("%Y-%m").to_string(),
        streak: habit.streak(),
        days,
    }
}
