use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;
use tracing::warn;

/// Upper bound on how far back a streak walk goes.
pub const MAX_STREAK_DAYS: u32 = 365 * 5;

/// Length of the unbroken run of completed days ending at `today`, or at
/// yesterday when today has not been completed yet.
pub fn compute_streak_at(today: NaiveDate, dates: &BTreeSet<NaiveDate>) -> u32 {
    if dates.is_empty() {
        return 0;
    }

    let mut day = if dates.contains(&today) {
        today
    } else {
        let yesterday = today - Duration::days(1);
        if !dates.contains(&yesterday) {
            return 0;
        }
        yesterday
    };

    let mut streak = 0;
    while streak < MAX_STREAK_DAYS && dates.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Parses `YYYY-MM-DD` completion values, dropping anything malformed.
pub fn parse_completion_dates<'a, I>(values: I) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .filter_map(|value| match parse_day(value) {
            Some(date) => Some(date),
            None => {
                warn!("skipping malformed completion date {value:?}");
                None
            }
        })
        .collect()
}

pub fn parse_day(value: &str) -> Option<NaiveDate> {
    // Timestamps are cut down to their calendar day.
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
