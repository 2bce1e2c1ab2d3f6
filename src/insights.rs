use crate::ai::{AiError, GenerationRequest, TextGenerator};
use crate::i18n::Language;
use crate::models::{
    resolve_category, Category, Habit, HabitSuggestion, DEFAULT_CATEGORY_NAMES,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

const MAX_SUGGESTIONS: usize = 5;

pub struct Insights {
    generator: Arc<dyn TextGenerator>,
}

#[derive(Debug, Serialize)]
struct HabitSummary<'a> {
    title: &'a str,
    category: &'a str,
    streak: u32,
    completed_today: bool,
}

impl Insights {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn habit_motivation(&self, title: &str, streak: u32, language: Language) -> String {
        let texts = language.texts();
        let prompt = format!(
            "You are a motivational habit coach.\n\
             Habit: \"{title}\"\n\
             Current streak: {streak} days.\n\
             Write at most two sentences. For streaks above 3 days include a fun, \
             plausible fact about the accumulated benefit; for 0 or 1 focus on the \
             power of starting. Plain text only. Language: {}.",
            language.prompt_name()
        );
        match self.generator.generate(GenerationRequest::text(prompt)).await {
            Ok(text) => text,
            Err(AiError::Empty) => texts.motivation_empty.to_string(),
            Err(err) => {
                warn!("motivation unavailable for {title:?}: {err}");
                texts.motivation_fallback.to_string()
            }
        }
    }

    pub async fn daily_insight(
        &self,
        habits: &[Habit],
        categories: &[Category],
        today: NaiveDate,
        language: Language,
    ) -> String {
        let texts = language.texts();
        if habits.is_empty() {
            return texts.insight_no_habits.to_string();
        }

        let summary: Vec<HabitSummary<'_>> = habits
            .iter()
            .map(|habit| HabitSummary {
                title: &habit.title,
                category: resolve_category(categories, &habit.category_id)
                    .map(|category| category.name.as_str())
                    .unwrap_or(texts.general_category),
                streak: habit.streak(),
                completed_today: habit.is_completed_on(today),
            })
            .collect();
        let summary = match serde_json::to_string(&summary) {
            Ok(json) => json,
            Err(err) => {
                warn!("could not summarise habits for insight: {err}");
                return texts.insight_fallback.to_string();
            }
        };

        let prompt = format!(
            "You are a behavioural scientist.\n\
             User habits: {summary}\n\
             Pick ONE habit and share a specific scientific fact, statistic or piece \
             of trivia about its benefits. Do not congratulate. If the habit's streak \
             is 0, suggest a psychological micro-step instead. At most two sentences, \
             phrased naturally for a native speaker. Language: {}.",
            language.prompt_name()
        );
        match self.generator.generate(GenerationRequest::text(prompt)).await {
            Ok(text) => text,
            Err(AiError::Empty) => texts.insight_empty.to_string(),
            Err(err) => {
                warn!("daily insight unavailable: {err}");
                texts.insight_fallback.to_string()
            }
        }
    }

    pub async fn habit_suggestions(&self, goal: &str, language: Language) -> Vec<HabitSuggestion> {
        let prompt = format!(
            "I want to build better habits. My goal: \"{goal}\".\n\
             Suggest {MAX_SUGGESTIONS} specific, simple habits as a JSON array of objects \
             with fields habitName, category and reason. Write habitName and reason in {}. \
             category MUST be exactly one of: {}.",
            language.prompt_name(),
            DEFAULT_CATEGORY_NAMES.join(", ")
        );
        let raw = match self.generator.generate(GenerationRequest::json(prompt)).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("habit suggestions unavailable: {err}");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<HabitSuggestion>>(&raw) {
            Ok(suggestions) => suggestions
                .into_iter()
                .take(MAX_SUGGESTIONS)
                .map(normalize_suggestion)
                .collect(),
            Err(err) => {
                warn!("discarding malformed habit suggestions: {err}");
                Vec::new()
            }
        }
    }
}

fn normalize_suggestion(mut suggestion: HabitSuggestion) -> HabitSuggestion {
    let known = DEFAULT_CATEGORY_NAMES
        .iter()
        .find(|name| name.eq_ignore_ascii_case(suggestion.category.trim()));
    suggestion.category = known.copied().unwrap_or("Other").to_string();
    suggestion
}
