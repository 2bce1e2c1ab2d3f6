use super::{AuthService, DataService};
use crate::errors::ServiceError;
use crate::models::{
    sort_categories, Category, CategoryColor, CategoryDraft, CompletionRow, Credentials,
    HabitDraft, HabitRow, Session, SignUpOutcome, User, DEFAULT_CATEGORY_NAMES,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const DEFAULT_COLORS: [CategoryColor; 6] = [
    CategoryColor::Emerald,
    CategoryColor::Blue,
    CategoryColor::Purple,
    CategoryColor::Yellow,
    CategoryColor::Orange,
    CategoryColor::Slate,
];

/// In-process stand-in for the hosted backend. Rows are isolated per user
/// exactly like the row-level policies of the real tables.
pub struct MemoryBackend {
    auto_confirm: bool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, RefreshGrant>,
    categories: Vec<CategoryRecord>,
    habits: Vec<HabitRecord>,
    completions: Vec<CompletionRecord>,
}

struct RefreshGrant {
    user_id: String,
    access_token: String,
}

struct Account {
    user: User,
    password: String,
    confirmed: bool,
}

struct CategoryRecord {
    category: Category,
    owner: Option<String>,
}

struct HabitRecord {
    id: String,
    owner: String,
    title: String,
    category: String,
    created_at: DateTime<Utc>,
}

struct CompletionRecord {
    owner: String,
    habit_id: String,
    date: NaiveDate,
}

impl MemoryBackend {
    pub fn new(auto_confirm: bool) -> Self {
        let categories = DEFAULT_CATEGORY_NAMES
            .iter()
            .zip(DEFAULT_COLORS)
            .map(|(name, color)| CategoryRecord {
                category: Category {
                    id: format!("default-{}", name.to_ascii_lowercase()),
                    name: (*name).to_string(),
                    color,
                    is_default: true,
                },
                owner: None,
            })
            .collect();
        Self {
            auto_confirm,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            inner: Mutex::new(Tables {
                categories,
                ..Tables::default()
            }),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Marks the account as verified, as the emailed link would.
    pub fn confirm_email(&self, email: &str) -> bool {
        let mut tables = self.tables();
        match tables.accounts.get_mut(&normalize_email(email)) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Invalidates all access tokens, as if they had expired.
    pub fn revoke_access_tokens(&self) {
        self.tables().tokens.clear();
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means a panicking test; the tables stay usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_read(&self) -> Result<(), ServiceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("simulated read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), ServiceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("simulated write failure".into()));
        }
        Ok(())
    }

    fn issue_session(tables: &mut Tables, user: &User) -> Session {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        tables.tokens.insert(access_token.clone(), user.id.clone());
        tables.refresh_tokens.insert(
            refresh_token.clone(),
            RefreshGrant {
                user_id: user.id.clone(),
                access_token: access_token.clone(),
            },
        );
        Session {
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: None,
            user: user.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Tables {
    fn owner(&self, access_token: &str) -> Result<String, ServiceError> {
        self.tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("invalid JWT".into()))
    }

    fn user_by_id(&self, user_id: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|account| account.user.id == user_id)
    }

    fn owned_habit(&self, owner: &str, habit_id: &str) -> Result<usize, ServiceError> {
        self.habits
            .iter()
            .position(|habit| habit.id == habit_id && habit.owner == owner)
            .ok_or_else(|| ServiceError::NotFound(format!("habit {habit_id}")))
    }

    fn owned_category(&self, owner: &str, category_id: &str) -> Result<usize, ServiceError> {
        self.categories
            .iter()
            .position(|record| {
                record.category.id == category_id && record.owner.as_deref() == Some(owner)
            })
            .ok_or_else(|| ServiceError::NotFound(format!("category {category_id}")))
    }
}

#[async_trait]
impl DataService for MemoryBackend {
    async fn list_habits(&self, session: &Session) -> Result<Vec<HabitRow>, ServiceError> {
        self.check_read()?;
        let tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let mut rows: Vec<HabitRow> = tables
            .habits
            .iter()
            .filter(|habit| habit.owner == owner)
            .map(|habit| HabitRow {
                id: habit.id.clone(),
                title: habit.title.clone(),
                category: habit.category.clone(),
                created_at: habit.created_at,
                habit_completions: tables
                    .completions
                    .iter()
                    .filter(|completion| {
                        completion.owner == owner && completion.habit_id == habit.id
                    })
                    .map(|completion| CompletionRow {
                        completed_at: completion.date.to_string(),
                    })
                    .collect(),
            })
            .collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }

    async fn insert_habit(
        &self,
        session: &Session,
        draft: &HabitDraft,
    ) -> Result<HabitRow, ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let record = HabitRecord {
            id: Uuid::new_v4().to_string(),
            owner,
            title: draft.title.clone(),
            category: draft.category_id.clone(),
            created_at: Utc::now(),
        };
        let row = HabitRow {
            id: record.id.clone(),
            title: record.title.clone(),
            category: record.category.clone(),
            created_at: record.created_at,
            habit_completions: Vec::new(),
        };
        tables.habits.push(record);
        Ok(row)
    }

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        draft: &HabitDraft,
    ) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let index = tables.owned_habit(&owner, habit_id)?;
        let habit = &mut tables.habits[index];
        habit.title = draft.title.clone();
        habit.category = draft.category_id.clone();
        Ok(())
    }

    async fn delete_habit(&self, session: &Session, habit_id: &str) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let index = tables.owned_habit(&owner, habit_id)?;
        tables.habits.remove(index);
        tables
            .completions
            .retain(|completion| !(completion.owner == owner && completion.habit_id == habit_id));
        Ok(())
    }

    async fn insert_completion(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        tables.owned_habit(&owner, habit_id)?;
        let duplicate = tables
            .completions
            .iter()
            .any(|completion| completion.habit_id == habit_id && completion.date == date);
        if duplicate {
            return Err(ServiceError::Rejected {
                status: 409,
                message: format!("completion for {habit_id} on {date} already exists"),
            });
        }
        tables.completions.push(CompletionRecord {
            owner,
            habit_id: habit_id.to_string(),
            date,
        });
        Ok(())
    }

    async fn delete_completion(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        tables.completions.retain(|completion| {
            !(completion.owner == owner && completion.habit_id == habit_id && completion.date == date)
        });
        Ok(())
    }

    async fn list_categories(&self, session: &Session) -> Result<Vec<Category>, ServiceError> {
        self.check_read()?;
        let tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let mut categories: Vec<Category> = tables
            .categories
            .iter()
            .filter(|record| record.owner.is_none() || record.owner.as_deref() == Some(&owner))
            .map(|record| record.category.clone())
            .collect();
        sort_categories(&mut categories);
        Ok(categories)
    }

    async fn insert_category(
        &self,
        session: &Session,
        draft: &CategoryDraft,
    ) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        tables.categories.push(CategoryRecord {
            category: Category {
                id: Uuid::new_v4().to_string(),
                name: draft.name.clone(),
                color: draft.color,
                is_default: false,
            },
            owner: Some(owner),
        });
        Ok(())
    }

    async fn update_category(
        &self,
        session: &Session,
        category_id: &str,
        draft: &CategoryDraft,
    ) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let index = tables.owned_category(&owner, category_id)?;
        let category = &mut tables.categories[index].category;
        category.name = draft.name.clone();
        category.color = draft.color;
        Ok(())
    }

    async fn delete_category(
        &self,
        session: &Session,
        category_id: &str,
    ) -> Result<(), ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let owner = tables.owner(&session.access_token)?;
        let index = tables.owned_category(&owner, category_id)?;
        tables.categories.remove(index);
        Ok(())
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, ServiceError> {
        let email = normalize_email(&credentials.email);
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::Rejected {
                status: 400,
                message: "a valid email address is required".into(),
            });
        }
        if credentials.password.len() < 6 {
            return Err(ServiceError::Rejected {
                status: 422,
                message: "password should be at least 6 characters".into(),
            });
        }

        let mut tables = self.tables();
        if tables.accounts.contains_key(&email) {
            return Err(ServiceError::Rejected {
                status: 422,
                message: "user already registered".into(),
            });
        }
        tables.accounts.insert(
            email.clone(),
            Account {
                user: User {
                    id: Uuid::new_v4().to_string(),
                    email,
                    full_name: None,
                },
                password: credentials.password.clone(),
                confirmed: self.auto_confirm,
            },
        );
        Ok(SignUpOutcome {
            verification_required: !self.auto_confirm,
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ServiceError> {
        let mut tables = self.tables();
        let user = match tables.accounts.get(&normalize_email(&credentials.email)) {
            Some(account) if account.password == credentials.password => {
                if !account.confirmed {
                    return Err(ServiceError::Rejected {
                        status: 400,
                        message: "Email not confirmed".into(),
                    });
                }
                account.user.clone()
            }
            _ => {
                return Err(ServiceError::Rejected {
                    status: 400,
                    message: "Invalid login credentials".into(),
                });
            }
        };
        Ok(Self::issue_session(&mut tables, &user))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), ServiceError> {
        let mut tables = self.tables();
        tables.tokens.remove(&session.access_token);
        if let Some(refresh_token) = &session.refresh_token {
            tables.refresh_tokens.remove(refresh_token);
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<User, ServiceError> {
        let tables = self.tables();
        let user_id = tables.owner(access_token)?;
        tables
            .user_by_id(&user_id)
            .map(|account| account.user.clone())
            .ok_or_else(|| ServiceError::Unauthorized("user no longer exists".into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ServiceError> {
        let mut tables = self.tables();
        let grant = tables
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| ServiceError::Unauthorized("invalid refresh token".into()))?;
        tables.tokens.remove(&grant.access_token);
        let user = tables
            .user_by_id(&grant.user_id)
            .map(|account| account.user.clone())
            .ok_or_else(|| ServiceError::Unauthorized("user no longer exists".into()))?;
        Ok(Self::issue_session(&mut tables, &user))
    }

    async fn update_profile(
        &self,
        access_token: &str,
        full_name: &str,
    ) -> Result<User, ServiceError> {
        self.check_write()?;
        let mut tables = self.tables();
        let user_id = tables.owner(access_token)?;
        let account = tables
            .accounts
            .values_mut()
            .find(|account| account.user.id == user_id)
            .ok_or_else(|| ServiceError::Unauthorized("user no longer exists".into()))?;
        account.user.full_name = Some(full_name.to_string());
        Ok(account.user.clone())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(email: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: "hunter22".into(),
        }
    }

    async fn signed_in(backend: &MemoryBackend, email: &str) -> Session {
        backend.sign_up(&credentials(email)).await.unwrap();
        backend.sign_in(&credentials(email)).await.unwrap()
    }

    #[tokio::test]
    async fn sign_in_requires_confirmed_email() {
        let backend = MemoryBackend::new(false);
        let outcome = backend.sign_up(&credentials("a@example.com")).await.unwrap();
        assert!(outcome.verification_required);

        let err = backend.sign_in(&credentials("a@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { status: 400, .. }));

        assert!(backend.confirm_email("A@example.com"));
        assert!(backend.sign_in(&credentials("a@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn rows_are_isolated_per_user() {
        let backend = MemoryBackend::default();
        let alice = signed_in(&backend, "alice@example.com").await;
        let bob = signed_in(&backend, "bob@example.com").await;

        let draft = HabitDraft {
            title: "Meditate".into(),
            category_id: "default-mindfulness".into(),
        };
        let row = backend.insert_habit(&alice, &draft).await.unwrap();
        backend
            .insert_category(
                &alice,
                &CategoryDraft {
                    name: "Garden".into(),
                    color: CategoryColor::Pink,
                },
            )
            .await
            .unwrap();

        assert_eq!(backend.list_habits(&alice).await.unwrap().len(), 1);
        assert!(backend.list_habits(&bob).await.unwrap().is_empty());
        assert_eq!(backend.list_categories(&alice).await.unwrap().len(), 7);
        assert_eq!(backend.list_categories(&bob).await.unwrap().len(), 6);

        let err = backend.delete_habit(&bob, &row.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn default_categories_cannot_be_removed() {
        let backend = MemoryBackend::default();
        let session = signed_in(&backend, "c@example.com").await;
        let err = backend
            .delete_category(&session, "default-health")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn completions_are_unique_and_cascade() {
        let backend = MemoryBackend::default();
        let session = signed_in(&backend, "d@example.com").await;
        let row = backend
            .insert_habit(
                &session,
                &HabitDraft {
                    title: "Walk".into(),
                    category_id: "default-health".into(),
                },
            )
            .await
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();

        backend.insert_completion(&session, &row.id, date).await.unwrap();
        assert!(backend.insert_completion(&session, &row.id, date).await.is_err());

        backend.delete_habit(&session, &row.id).await.unwrap();
        assert!(backend.tables().completions.is_empty());
    }

    #[tokio::test]
    async fn revoked_tokens_are_unauthorized_until_refreshed() {
        let backend = MemoryBackend::default();
        let session = signed_in(&backend, "e@example.com").await;
        backend.revoke_access_tokens();

        let err = backend.list_habits(&session).await.unwrap_err();
        assert!(err.is_auth_related());

        let refreshed = backend
            .refresh(session.refresh_token.as_deref().unwrap())
            .await
            .unwrap();
        assert!(backend.list_habits(&refreshed).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_retires_previous_access_token() {
        let backend = MemoryBackend::default();
        let session = signed_in(&backend, "f@example.com").await;

        let refreshed = backend
            .refresh(session.refresh_token.as_deref().unwrap())
            .await
            .unwrap();
        assert_ne!(refreshed.access_token, session.access_token);
        assert!(backend.get_user(&session.access_token).await.is_err());
        assert!(backend.get_user(&refreshed.access_token).await.is_ok());
        assert_eq!(backend.tables().tokens.len(), 1);
        assert!(
            backend
                .refresh(session.refresh_token.as_deref().unwrap())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn failing_reads_leave_writes_alone() {
        let backend = MemoryBackend::default();
        let session = signed_in(&backend, "g@example.com").await;
        backend.set_fail_reads(true);

        let err = backend.list_categories(&session).await.unwrap_err();
        assert!(!err.is_auth_related());
        assert!(backend.list_habits(&session).await.is_err());
        let draft = HabitDraft {
            title: "Walk".into(),
            category_id: "default-fitness".into(),
        };
        assert!(backend.insert_habit(&session, &draft).await.is_ok());

        backend.set_fail_reads(false);
        assert_eq!(backend.list_habits(&session).await.unwrap().len(), 1);
    }
}
