use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/session", get(handlers::get_session))
        .route("/api/session/verify", post(handlers::verify_session))
        .route("/api/auth/signup", post(handlers::sign_up))
        .route("/api/auth/signin", post(handlers::sign_in))
        .route("/api/auth/signout", post(handlers::sign_out))
        .route("/api/profile", put(handlers::update_profile))
        .route(
            "/api/preferences/language",
            get(handlers::get_language).put(handlers::set_language),
        )
        .route(
            "/api/preferences/language/toggle",
            post(handlers::toggle_language),
        )
        .route("/api/workspace/reload", post(handlers::reload_workspace))
        .route(
            "/api/habits",
            get(handlers::list_habits).post(handlers::add_habit),
        )
        .route(
            "/api/habits/:id",
            patch(handlers::update_habit).delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/toggle", post(handlers::toggle_habit))
        .route("/api/habits/:id/history", get(handlers::habit_history))
        .route("/api/habits/:id/motivation", get(handlers::habit_motivation))
        .route(
            "/api/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/categories/:id",
            patch(handlers::update_category).delete(handlers::delete_category),
        )
        .route("/api/analytics", get(handlers::get_analytics))
        .route("/api/insight", get(handlers::get_insight))
        .route("/api/suggestions", post(handlers::suggest_habits))
        .with_state(state)
}
