use crate::errors::AppError;
use crate::models::{Category, CompletionChange, Habit};
use chrono::NaiveDate;
use std::collections::HashMap;

/// In-memory habits and categories of the signed-in user.
///
/// This is the optimistic view: toggles land here before the remote write
/// is confirmed and are rolled back from a [`PendingToggle`] snapshot when it
/// is not.
#[derive(Debug, Default)]
pub struct Workspace {
    habits: Vec<Habit>,
    categories: Vec<Category>,
    insight: Option<String>,
    in_flight: HashMap<String, u64>,
    next_ticket: u64,
}

/// A toggle applied locally and awaiting remote confirmation.
#[derive(Debug, Clone)]
pub struct PendingToggle {
    pub previous: Habit,
    pub updated: Habit,
    pub change: CompletionChange,
    ticket: u64,
}

impl PendingToggle {
    pub fn habit_id(&self) -> &str {
        &self.previous.id
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ToggleError {
    UnknownHabit,
    FutureDate,
    WriteInFlight,
}

impl From<ToggleError> for AppError {
    fn from(err: ToggleError) -> Self {
        match err {
            ToggleError::UnknownHabit => AppError::not_found("habit not found"),
            ToggleError::FutureDate => AppError::bad_request("cannot complete a habit in the future"),
            ToggleError::WriteInFlight => {
                AppError::conflict("a completion write for this habit is still in flight")
            }
        }
    }
}

impl Workspace {
    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn habit(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == habit_id)
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
    }

    pub fn replace(&mut self, habits: Vec<Habit>, categories: Vec<Category>) {
        self.habits = habits;
        self.categories = categories;
        self.in_flight.clear();
    }

    pub fn set_categories(&mut self, categories: Vec<Category>) {
        self.categories = categories;
    }

    pub fn clear(&mut self) {
        self.habits.clear();
        self.categories.clear();
        self.insight = None;
        self.in_flight.clear();
    }

    pub fn insight(&self) -> Option<&str> {
        self.insight.as_deref()
    }

    pub fn set_insight(&mut self, insight: Option<String>) {
        self.insight = insight;
    }

    /// Recomputes every derived streak against `today`.
    pub fn refresh_streaks(&mut self, today: NaiveDate) {
        for habit in &mut self.habits {
            habit.refresh_streak(today);
        }
    }

    pub fn push_habit(&mut self, habit: Habit) {
        self.habits.push(habit);
    }

    pub fn rename_habit(&mut self, habit_id: &str, title: &str, category_id: &str) -> bool {
        match self.habits.iter_mut().find(|habit| habit.id == habit_id) {
            Some(habit) => {
                habit.title = title.to_string();
                habit.category_id = category_id.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes a habit, returning it with its position for [`Self::restore_habit`].
    pub fn remove_habit(&mut self, habit_id: &str) -> Option<(usize, Habit)> {
        let index = self.habits.iter().position(|habit| habit.id == habit_id)?;
        Some((index, self.habits.remove(index)))
    }

    pub fn restore_habit(&mut self, index: usize, habit: Habit) {
        let index = index.min(self.habits.len());
        self.habits.insert(index, habit);
    }

    /// Applies a completion toggle locally and marks the habit as having a
    /// write in flight.
    pub fn begin_toggle(
        &mut self,
        habit_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PendingToggle, ToggleError> {
        if date > today {
            return Err(ToggleError::FutureDate);
        }
        if self.in_flight.contains_key(habit_id) {
            return Err(ToggleError::WriteInFlight);
        }
        let habit = self
            .habits
            .iter_mut()
            .find(|habit| habit.id == habit_id)
            .ok_or(ToggleError::UnknownHabit)?;

        let previous = habit.clone();
        let change = habit.toggle(date, today);
        let updated = habit.clone();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight.insert(habit_id.to_string(), ticket);

        Ok(PendingToggle {
            previous,
            updated,
            change,
            ticket,
        })
    }

    /// Releases the in-flight mark if it still belongs to `pending`. A reload
    /// in between replaces the habits and drops every mark.
    fn settle(&mut self, pending: &PendingToggle) -> bool {
        if self.in_flight.get(pending.habit_id()) != Some(&pending.ticket) {
            return false;
        }
        self.in_flight.remove(pending.habit_id());
        true
    }

    /// The remote write succeeded; the tentative state stands.
    pub fn commit_toggle(&mut self, pending: &PendingToggle) {
        self.settle(pending);
    }

    /// The remote write failed; put the pre-toggle habit back verbatim,
    /// unless the workspace was reloaded while the write was outstanding.
    pub fn revert_toggle(&mut self, pending: PendingToggle) {
        if !self.settle(&pending) {
            return;
        }
        if let Some(habit) = self
            .habits
            .iter_mut()
            .find(|habit| habit.id == pending.previous.id)
        {
            *habit = pending.previous;
        }
    }
}
