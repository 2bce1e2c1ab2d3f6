pub mod ai;
pub mod app;
pub mod backend;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod i18n;
pub mod insights;
pub mod models;
pub mod prefs;
pub mod session;
pub mod state;
pub mod stats;
pub mod streak;
pub mod tracker;
pub mod workspace;

pub use app::router;
pub use config::Config;
pub use prefs::load_preferences;
pub use state::AppState;
pub use streak::compute_streak_at;
