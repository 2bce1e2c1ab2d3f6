use crate::errors::{AppError, ServiceError};
use crate::history::month_history;
use crate::i18n::Language;
use crate::models::{
    AnalyticsResponse, CategoryDraft, CategoryView, CompletionChange, Habit, HabitDraft,
    HabitListResponse, HabitSuggestion, HabitView, HistoryResponse,
};
use crate::prefs::persist_preferences;
use crate::session::AuthEvent;
use crate::state::AppState;
use crate::stats::build_analytics;
use crate::workspace::Workspace;
use chrono::{Local, NaiveDate};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Reloads habits and categories from the data service. On failure the
/// workspace is left empty.
pub async fn load_workspace(state: &AppState) -> Result<(), AppError> {
    load_workspace_at(state, today()).await
}

pub async fn load_workspace_at(state: &AppState, today: NaiveDate) -> Result<(), AppError> {
    let session = state.session.require().await?;

    let categories = state.data.list_categories(&session).await;
    let habits = state.data.list_habits(&session).await;

    let (categories, habits) = match (categories, habits) {
        (Ok(categories), Ok(rows)) => {
            let habits: Vec<Habit> = rows
                .into_iter()
                .map(|row| Habit::from_row(row, today))
                .collect();
            (categories, habits)
        }
        (categories, habits) => {
            let err = categories.err().or(habits.err()).unwrap_or_else(|| {
                ServiceError::Decode("workspace load failed".into())
            });
            error!("failed to load workspace: {err}");
            state.workspace.lock().await.replace(Vec::new(), Vec::new());
            if err.is_auth_related() {
                state.session.verify().await;
            }
            return Err(err.into());
        }
    };

    info!(
        habits = habits.len(),
        categories = categories.len(),
        "workspace loaded"
    );
    let mut workspace = state.workspace.lock().await;
    workspace.replace(habits, categories);
    workspace.set_insight(None);
    Ok(())
}

pub async fn list_habits(
    state: &AppState,
    date: Option<NaiveDate>,
) -> Result<HabitListResponse, AppError> {
    state.session.require().await?;
    let today = today();
    let date = date.unwrap_or(today);
    if date > today {
        return Err(AppError::bad_request("cannot view days in the future"));
    }

    let language = state.language().await;
    let mut workspace = state.workspace.lock().await;
    workspace.refresh_streaks(today);
    let habits = workspace
        .habits()
        .iter()
        .map(|habit| HabitView::new(habit, workspace.categories(), date, language))
        .collect();
    Ok(HabitListResponse { date, habits })
}

pub async fn add_habit(state: &AppState, draft: HabitDraft) -> Result<HabitView, AppError> {
    let draft = validate_habit(draft)?;
    let session = state.session.require().await?;
    let row = match state.data.insert_habit(&session, &draft).await {
        Ok(row) => row,
        Err(err) => return Err(remote_failure(state, "failed to add habit", err).await),
    };

    let today = today();
    let habit = Habit::from_row(row, today);
    let language = state.language().await;
    let mut workspace = state.workspace.lock().await;
    if workspace.habits().is_empty() {
        workspace.set_insight(None);
    }
    let view = HabitView::new(&habit, workspace.categories(), today, language);
    workspace.push_habit(habit);
    Ok(view)
}

pub async fn update_habit(
    state: &AppState,
    habit_id: &str,
    draft: HabitDraft,
) -> Result<HabitView, AppError> {
    let draft = validate_habit(draft)?;
    let session = state.session.require().await?;
    if state.workspace.lock().await.habit(habit_id).is_none() {
        return Err(AppError::not_found("habit not found"));
    }

    if let Err(err) = state.data.update_habit(&session, habit_id, &draft).await {
        let context = format!("failed to update habit {habit_id}");
        return Err(remote_failure(state, &context, err).await);
    }

    let language = state.language().await;
    let mut workspace = state.workspace.lock().await;
    workspace.rename_habit(habit_id, &draft.title, &draft.category_id);
    let habit = workspace
        .habit(habit_id)
        .ok_or_else(|| AppError::not_found("habit not found"))?;
    Ok(HabitView::new(habit, workspace.categories(), today(), language))
}

/// Removes the habit locally first and puts it back if the remote delete
/// fails.
pub async fn delete_habit(state: &AppState, habit_id: &str) -> Result<(), AppError> {
    let session = state.session.require().await?;
    let (index, habit) = state
        .workspace
        .lock()
        .await
        .remove_habit(habit_id)
        .ok_or_else(|| AppError::not_found("habit not found"))?;

    if let Err(err) = state.data.delete_habit(&session, habit_id).await {
        error!("failed to delete habit {habit_id}: {err}");
        state.workspace.lock().await.restore_habit(index, habit);
        state.session.verify().await;
        return Err(err.into());
    }
    Ok(())
}

pub async fn toggle_completion(
    state: &AppState,
    habit_id: &str,
    date: NaiveDate,
) -> Result<HabitView, AppError> {
    toggle_completion_at(state, habit_id, date, today()).await
}

/// Flips one completion date. The new state (and streak) is visible before
/// the remote write returns; a failed write restores the previous habit and
/// re-verifies the session.
pub async fn toggle_completion_at(
    state: &AppState,
    habit_id: &str,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<HabitView, AppError> {
    let session = state.session.require().await?;
    let pending = state
        .workspace
        .lock()
        .await
        .begin_toggle(habit_id, date, today)?;

    let write = match pending.change {
        CompletionChange::Added(day) => state.data.insert_completion(&session, habit_id, day).await,
        CompletionChange::Removed(day) => {
            state.data.delete_completion(&session, habit_id, day).await
        }
    };

    let language = state.language().await;
    match write {
        Ok(()) => {
            let mut workspace = state.workspace.lock().await;
            workspace.commit_toggle(&pending);
            Ok(HabitView::new(
                &pending.updated,
                workspace.categories(),
                date,
                language,
            ))
        }
        Err(err) => {
            warn!("completion write for {habit_id} on {date} failed, reverting: {err}");
            state.workspace.lock().await.revert_toggle(pending);
            state.session.verify().await;
            Err(err.into())
        }
    }
}

pub async fn habit_history(
    state: &AppState,
    habit_id: &str,
    month: Option<NaiveDate>,
) -> Result<HistoryResponse, AppError> {
    state.session.require().await?;
    let today = today();
    let mut workspace = state.workspace.lock().await;
    workspace.refresh_streaks(today);
    let habit = workspace
        .habit(habit_id)
        .ok_or_else(|| AppError::not_found("habit not found"))?;
    Ok(month_history(habit, month.unwrap_or(today), today))
}

pub async fn list_categories(state: &AppState) -> Result<Vec<CategoryView>, AppError> {
    state.session.require().await?;
    let language = state.language().await;
    let workspace = state.workspace.lock().await;
    Ok(category_views(&workspace, language))
}

pub async fn create_category(
    state: &AppState,
    draft: CategoryDraft,
) -> Result<Vec<CategoryView>, AppError> {
    let draft = validate_category(draft)?;
    let session = state.session.require().await?;
    if let Err(err) = state.data.insert_category(&session, &draft).await {
        return Err(remote_failure(state, "failed to create category", err).await);
    }
    reload_categories(state).await
}

pub async fn update_category(
    state: &AppState,
    category_id: &str,
    draft: CategoryDraft,
) -> Result<Vec<CategoryView>, AppError> {
    let draft = validate_category(draft)?;
    let session = state.session.require().await?;
    ensure_custom(state, category_id).await?;
    if let Err(err) = state
        .data
        .update_category(&session, category_id, &draft)
        .await
    {
        let context = format!("failed to update category {category_id}");
        return Err(remote_failure(state, &context, err).await);
    }
    reload_categories(state).await
}

/// Habits still pointing at a deleted category render the unknown
/// placeholder.
pub async fn delete_category(
    state: &AppState,
    category_id: &str,
) -> Result<Vec<CategoryView>, AppError> {
    let session = state.session.require().await?;
    ensure_custom(state, category_id).await?;
    if let Err(err) = state.data.delete_category(&session, category_id).await {
        let context = format!("failed to delete category {category_id}");
        return Err(remote_failure(state, &context, err).await);
    }
    reload_categories(state).await
}

pub async fn analytics(state: &AppState) -> Result<AnalyticsResponse, AppError> {
    state.session.require().await?;
    let language = state.language().await;
    let workspace = state.workspace.lock().await;
    Ok(build_analytics(workspace.habits(), language))
}

/// The cached daily insight, generated on first request or when `refresh`
/// is set.
pub async fn daily_insight(state: &AppState, refresh: bool) -> Result<String, AppError> {
    state.session.require().await?;
    let language = state.language().await;
    let (habits, categories) = {
        let workspace = state.workspace.lock().await;
        if let (false, Some(insight)) = (refresh, workspace.insight()) {
            return Ok(insight.to_string());
        }
        (workspace.habits().to_vec(), workspace.categories().to_vec())
    };

    let insight = state
        .insights
        .daily_insight(&habits, &categories, today(), language)
        .await;
    if !habits.is_empty() {
        state
            .workspace
            .lock()
            .await
            .set_insight(Some(insight.clone()));
    }
    Ok(insight)
}

pub async fn habit_motivation(state: &AppState, habit_id: &str) -> Result<String, AppError> {
    state.session.require().await?;
    let language = state.language().await;
    let (title, streak) = {
        let mut workspace = state.workspace.lock().await;
        workspace.refresh_streaks(today());
        let habit = workspace
            .habit(habit_id)
            .ok_or_else(|| AppError::not_found("habit not found"))?;
        (habit.title.clone(), habit.streak())
    };
    Ok(state
        .insights
        .habit_motivation(&title, streak, language)
        .await)
}

pub async fn habit_suggestions(
    state: &AppState,
    goal: &str,
) -> Result<Vec<HabitSuggestion>, AppError> {
    state.session.require().await?;
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(AppError::bad_request("goal must not be empty"));
    }
    let language = state.language().await;
    Ok(state.insights.habit_suggestions(goal, language).await)
}

/// Ends the session and empties the workspace before returning.
pub async fn sign_out(state: &AppState) {
    state.session.sign_out().await;
    state.workspace.lock().await.clear();
}

/// Empties the workspace when the session ends on its own (failed refresh or
/// verification). Events can arrive after a newer sign-in, so the session is
/// checked again under the workspace lock.
pub async fn follow_auth_events(state: AppState, mut events: broadcast::Receiver<AuthEvent>) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedOut) => {
                let mut workspace = state.workspace.lock().await;
                if state.session.current_user().await.is_none() {
                    workspace.clear();
                    info!("signed out, workspace cleared");
                } else {
                    debug!("ignoring sign-out superseded by a newer session");
                }
            }
            Ok(event) => debug!(?event, "auth event"),
            Err(RecvError::Lagged(skipped)) => warn!("missed {skipped} auth events"),
            Err(RecvError::Closed) => break,
        }
    }
}

pub async fn set_language(state: &AppState, language: Language) -> Result<Language, AppError> {
    let mut prefs = state.prefs.lock().await;
    prefs.language = language;
    persist_preferences(&state.prefs_path, &prefs).await?;
    info!(language = language.code(), "language changed");
    Ok(language)
}

pub async fn toggle_language(state: &AppState) -> Result<Language, AppError> {
    let next = state.language().await.toggled();
    set_language(state, next).await
}

async fn reload_categories(state: &AppState) -> Result<Vec<CategoryView>, AppError> {
    let session = state.session.require().await?;
    let categories = match state.data.list_categories(&session).await {
        Ok(categories) => categories,
        Err(err) => return Err(remote_failure(state, "failed to reload categories", err).await),
    };
    let language = state.language().await;
    let mut workspace = state.workspace.lock().await;
    workspace.set_categories(categories);
    Ok(category_views(&workspace, language))
}

/// Logs a failed remote call and re-validates the session when the failure
/// looks like a stale token.
async fn remote_failure(state: &AppState, context: &str, err: ServiceError) -> AppError {
    error!("{context}: {err}");
    if err.is_auth_related() {
        state.session.verify().await;
    }
    err.into()
}

async fn ensure_custom(state: &AppState, category_id: &str) -> Result<(), AppError> {
    let workspace = state.workspace.lock().await;
    match workspace.category(category_id) {
        Some(category) if category.is_default => {
            Err(AppError::forbidden("default categories cannot be changed"))
        }
        _ => Ok(()),
    }
}

fn category_views(workspace: &Workspace, language: Language) -> Vec<CategoryView> {
    workspace
        .categories()
        .iter()
        .map(|category| CategoryView::new(category, language))
        .collect()
}

fn validate_habit(draft: HabitDraft) -> Result<HabitDraft, AppError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    if draft.category_id.trim().is_empty() {
        return Err(AppError::bad_request("category_id is required"));
    }
    Ok(HabitDraft {
        title: title.to_string(),
        category_id: draft.category_id.trim().to_string(),
    })
}

fn validate_category(draft: CategoryDraft) -> Result<CategoryDraft, AppError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    Ok(CategoryDraft {
        name: name.to_string(),
        color: draft.color,
    })
}
