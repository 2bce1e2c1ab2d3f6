pub mod memory;
pub mod supabase;

use crate::errors::ServiceError;
use crate::models::{
    Category, CategoryDraft, Credentials, HabitDraft, HabitRow, Session, SignUpOutcome, User,
};
use async_trait::async_trait;
use chrono::NaiveDate;

pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;

/// Per-user table access: `habits`, `habit_completions` and `categories`.
/// Every call is scoped to the session's user.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Habits ordered by creation time, joined with their completion dates.
    async fn list_habits(&self, session: &Session) -> Result<Vec<HabitRow>, ServiceError>;

    async fn insert_habit(
        &self,
        session: &Session,
        draft: &HabitDraft,
    ) -> Result<HabitRow, ServiceError>;

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        draft: &HabitDraft,
    ) -> Result<(), ServiceError>;

    async fn delete_habit(&self, session: &Session, habit_id: &str) -> Result<(), ServiceError>;

    async fn insert_completion(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError>;

    async fn delete_completion(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError>;

    /// Categories ordered default-first, then by name.
    async fn list_categories(&self, session: &Session) -> Result<Vec<Category>, ServiceError>;

    async fn insert_category(
        &self,
        session: &Session,
        draft: &CategoryDraft,
    ) -> Result<(), ServiceError>;

    async fn update_category(
        &self,
        session: &Session,
        category_id: &str,
        draft: &CategoryDraft,
    ) -> Result<(), ServiceError>;

    async fn delete_category(
        &self,
        session: &Session,
        category_id: &str,
    ) -> Result<(), ServiceError>;
}

/// Session-based identity provider.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, ServiceError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ServiceError>;

    async fn sign_out(&self, session: &Session) -> Result<(), ServiceError>;

    async fn get_user(&self, access_token: &str) -> Result<User, ServiceError>;

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ServiceError>;

    async fn update_profile(
        &self,
        access_token: &str,
        full_name: &str,
    ) -> Result<User, ServiceError>;
}
