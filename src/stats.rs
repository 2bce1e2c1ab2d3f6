use crate::i18n::Language;
use crate::models::{AnalyticsResponse, BestDay, DayStatus, Habit};
use chrono::{Duration, Local, NaiveDate};

pub fn build_analytics(habits: &[Habit], language: Language) -> AnalyticsResponse {
    build_analytics_at(Local::now().date_naive(), habits, language)
}

pub fn build_analytics_at(today: NaiveDate, habits: &[Habit], language: Language) -> AnalyticsResponse {
    let total_habits = habits.len() as u32;

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        let completed_count = habits
            .iter()
            .filter(|habit| habit.is_completed_on(date))
            .count() as u32;
        last_7_days.push(DayStatus {
            date,
            completed_count,
            total_habits,
        });
    }

    if habits.is_empty() {
        return AnalyticsResponse {
            last_7_days,
            completion_rate: 0,
            best_day: None,
        };
    }

    let completed: u32 = last_7_days.iter().map(|day| day.completed_count).sum();
    let possible = total_habits * 7;
    let completion_rate = (f64::from(completed) / f64::from(possible) * 100.0).round() as u32;

    // Earliest day wins a tie.
    let max = last_7_days
        .iter()
        .map(|day| day.completed_count)
        .max()
        .unwrap_or(0);
    let best_day = last_7_days
        .iter()
        .find(|day| day.completed_count == max)
        .map(|day| BestDay {
            date: day.date,
            weekday: language.weekday_name(day.date).to_string(),
            completed_count: day.completed_count,
        });

    AnalyticsResponse {
        last_7_days,
        completion_rate,
        best_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn habit(id: &str, offsets: &[i64]) -> Habit {
        let dates = offsets
            .iter()
            .map(|offset| today() - Duration::days(*offset))
            .collect();
        Habit::new(id.into(), id.into(), "c".into(), dates, Utc::now(), today())
    }

    #[test]
    fn last_7_days_are_oldest_first() {
        let stats = build_analytics_at(today(), &[habit("a", &[0, 3])], Language::En);
        assert_eq!(stats.last_7_days.len(), 7);
        assert_eq!(stats.last_7_days[0].date, today() - Duration::days(6));
        assert_eq!(stats.last_7_days[6].date, today());
        assert_eq!(stats.last_7_days[6].completed_count, 1);
        assert_eq!(stats.last_7_days[3].completed_count, 1);
        assert!(stats.last_7_days.iter().all(|day| day.total_habits == 1));
    }

    #[test]
    fn completion_rate_rounds_to_percent() {
        // 3 of 14 possible completions -> 21.4%
        let habits = [habit("a", &[0, 1]), habit("b", &[0, 10])];
        let stats = build_analytics_at(today(), &habits, Language::En);
        assert_eq!(stats.completion_rate, 21);
    }

    #[test]
    fn best_day_prefers_earliest_maximum() {
        let habits = [habit("a", &[0, 4]), habit("b", &[0, 4])];
        let stats = build_analytics_at(today(), &habits, Language::Pl);
        let best = stats.best_day.unwrap();
        assert_eq!(best.date, today() - Duration::days(4));
        assert_eq!(best.completed_count, 2);
        assert_eq!(best.weekday, "Niedziela");
    }

    #[test]
    fn no_habits_means_no_best_day() {
        let stats = build_analytics_at(today(), &[], Language::En);
        assert_eq!(stats.completion_rate, 0);
        assert!(stats.best_day.is_none());
        assert!(stats.last_7_days.iter().all(|day| day.completed_count == 0));
    }
}
