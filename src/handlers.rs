use crate::errors::AppError;
use crate::history::parse_month;
use crate::models::{
    AnalyticsResponse, CategoryDraft, CategoryView, Credentials, HabitDraft, HabitListResponse,
    HabitSuggestion, HabitView, HistoryResponse, LanguageRequest, LanguageResponse,
    ProfileRequest, SessionResponse, SignUpOutcome, SuggestionRequest, TextResponse,
    ToggleRequest, UserView,
};
use crate::state::AppState;
use crate::tracker;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let user = state.session.current_user().await;
    Json(SessionResponse {
        user: user.as_ref().map(UserView::from),
    })
}

/// Called by the front end when it regains focus.
pub async fn verify_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let user = state.session.verify().await;
    Json(SessionResponse {
        user: user.as_ref().map(UserView::from),
    })
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<SignUpOutcome>), AppError> {
    let outcome = state.session.sign_up(&credentials).await?;
    let status = if outcome.verification_required {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state.session.sign_in(&credentials).await?;
    if let Err(err) = tracker::load_workspace(&state).await {
        warn!("signed in but workspace failed to load: {}", err.message);
    }
    Ok(Json(SessionResponse {
        user: Some(UserView::from(&user)),
    }))
}

pub async fn sign_out(State(state): State<AppState>) -> StatusCode {
    tracker::sign_out(&state).await;
    StatusCode::NO_CONTENT
}

pub async fn update_profile(
    State(state): State<AppState>,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<UserView>, AppError> {
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::bad_request("full_name must not be empty"));
    }
    let user = state.session.update_profile(full_name).await?;
    Ok(Json(UserView::from(&user)))
}

pub async fn get_language(State(state): State<AppState>) -> Json<LanguageResponse> {
    Json(LanguageResponse {
        language: state.language().await,
    })
}

pub async fn set_language(
    State(state): State<AppState>,
    Json(payload): Json<LanguageRequest>,
) -> Result<Json<LanguageResponse>, AppError> {
    let language = tracker::set_language(&state, payload.language).await?;
    Ok(Json(LanguageResponse { language }))
}

pub async fn toggle_language(
    State(state): State<AppState>,
) -> Result<Json<LanguageResponse>, AppError> {
    let language = tracker::toggle_language(&state).await?;
    Ok(Json(LanguageResponse { language }))
}

pub async fn reload_workspace(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    tracker::load_workspace(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_habits(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<HabitListResponse>, AppError> {
    Ok(Json(tracker::list_habits(&state, query.date).await?))
}

pub async fn add_habit(
    State(state): State<AppState>,
    Json(draft): Json<HabitDraft>,
) -> Result<(StatusCode, Json<HabitView>), AppError> {
    let habit = tracker::add_habit(&state, draft).await?;
    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Json(draft): Json<HabitDraft>,
) -> Result<Json<HabitView>, AppError> {
    Ok(Json(tracker::update_habit(&state, &habit_id, draft).await?))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracker::delete_habit(&state, &habit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<HabitView>, AppError> {
    Ok(Json(
        tracker::toggle_completion(&state, &habit_id, payload.date).await?,
    ))
}

pub async fn habit_history(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let month = match query.month.as_deref() {
        Some(value) => Some(
            parse_month(value).ok_or_else(|| AppError::bad_request("month must be YYYY-MM"))?,
        ),
        None => None,
    };
    Ok(Json(tracker::habit_history(&state, &habit_id, month).await?))
}

pub async fn habit_motivation(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
) -> Result<Json<TextResponse>, AppError> {
    let text = tracker::habit_motivation(&state, &habit_id).await?;
    Ok(Json(TextResponse { text }))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    Ok(Json(tracker::list_categories(&state).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(draft): Json<CategoryDraft>,
) -> Result<(StatusCode, Json<Vec<CategoryView>>), AppError> {
    let categories = tracker::create_category(&state, draft).await?;
    Ok((StatusCode::CREATED, Json(categories)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Json(draft): Json<CategoryDraft>,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    Ok(Json(
        tracker::update_category(&state, &category_id, draft).await?,
    ))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<Json<Vec<CategoryView>>, AppError> {
    Ok(Json(tracker::delete_category(&state, &category_id).await?))
}

pub async fn get_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    Ok(Json(tracker::analytics(&state).await?))
}

pub async fn get_insight(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<TextResponse>, AppError> {
    let text = tracker::daily_insight(&state, query.refresh).await?;
    Ok(Json(TextResponse { text }))
}

pub async fn suggest_habits(
    State(state): State<AppState>,
    Json(payload): Json<SuggestionRequest>,
) -> Result<Json<Vec<HabitSuggestion>>, AppError> {
    Ok(Json(tracker::habit_suggestions(&state, &payload.goal).await?))
}
