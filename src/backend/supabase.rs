use super::{AuthService, DataService};
use crate::errors::ServiceError;
use crate::models::{
    Category, CategoryDraft, Credentials, HabitDraft, HabitRow, Session, SignUpOutcome, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration as StdDuration;

const HABITS: &str = "habits";
const COMPLETIONS: &str = "habit_completions";
const CATEGORIES: &str = "categories";

/// PostgREST + GoTrue client for a hosted Supabase project.
pub struct SupabaseClient {
    client: Client,
    rest_url: String,
    auth_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, ServiceError> {
        let base = base_url.trim_end_matches('/');
        let client = Client::builder()
            .timeout(StdDuration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            rest_url: format!("{base}/rest/v1"),
            auth_url: format!("{base}/auth/v1"),
            anon_key: anon_key.into(),
        })
    }

    fn rest(&self, method: Method, table: &str, session: &Session) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.auth_url))
            .header("apikey", &self.anon_key)
    }
}

#[async_trait]
impl DataService for SupabaseClient {
    async fn list_habits(&self, session: &Session) -> Result<Vec<HabitRow>, ServiceError> {
        let response = self
            .rest(Method::GET, HABITS, session)
            .query(&[
                ("select", "*,habit_completions(completed_at)"),
                ("order", "created_at.asc"),
            ])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn insert_habit(
        &self,
        session: &Session,
        draft: &HabitDraft,
    ) -> Result<HabitRow, ServiceError> {
        let response = self
            .rest(Method::POST, HABITS, session)
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": session.user.id,
                "title": draft.title,
                "category": draft.category_id,
            }))
            .send()
            .await?;
        let rows: Vec<HabitRow> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode("insert returned no habit row".into()))
    }

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        draft: &HabitDraft,
    ) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::PATCH, HABITS, session)
            .query(&[("id", eq(habit_id))])
            .json(&json!({ "title": draft.title, "category": draft.category_id }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_habit(&self, session: &Session, habit_id: &str) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::DELETE, HABITS, session)
            .query(&[("id", eq(habit_id))])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn insert_completion(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::POST, COMPLETIONS, session)
            .json(&json!({
                "user_id": session.user.id,
                "habit_id": habit_id,
                "completed_at": date.to_string(),
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_completion(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::DELETE, COMPLETIONS, session)
            .query(&[("habit_id", eq(habit_id)), ("completed_at", eq(&date.to_string()))])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list_categories(&self, session: &Session) -> Result<Vec<Category>, ServiceError> {
        let response = self
            .rest(Method::GET, CATEGORIES, session)
            .query(&[("select", "*"), ("order", "is_default.desc,name.asc")])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn insert_category(
        &self,
        session: &Session,
        draft: &CategoryDraft,
    ) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::POST, CATEGORIES, session)
            .json(&json!({
                "name": draft.name,
                "color": draft.color,
                "user_id": session.user.id,
                "is_default": false,
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn update_category(
        &self,
        session: &Session,
        category_id: &str,
        draft: &CategoryDraft,
    ) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::PATCH, CATEGORIES, session)
            .query(&[("id", eq(category_id))])
            .json(&json!({ "name": draft.name, "color": draft.color }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_category(
        &self,
        session: &Session,
        category_id: &str,
    ) -> Result<(), ServiceError> {
        let response = self
            .rest(Method::DELETE, CATEGORIES, session)
            .query(&[("id", eq(category_id))])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthService for SupabaseClient {
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, ServiceError> {
        let response = self
            .auth(Method::POST, "signup")
            .json(&json!({ "email": credentials.email, "password": credentials.password }))
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;
        // With email confirmation enabled the project returns a bare user
        // instead of a session.
        Ok(SignUpOutcome {
            verification_required: body.get("access_token").is_none(),
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ServiceError> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": credentials.email, "password": credentials.password }))
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), ServiceError> {
        let response = self
            .auth(Method::POST, "logout")
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<User, ServiceError> {
        let response = self
            .auth(Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: AuthUser = check(response).await?.json().await?;
        Ok(user.into())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ServiceError> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn update_profile(
        &self,
        access_token: &str,
        full_name: &str,
    ) -> Result<User, ServiceError> {
        let response = self
            .auth(Method::PUT, "user")
            .bearer_auth(access_token)
            .json(&json!({ "data": { "full_name": full_name } }))
            .send()
            .await?;
        let user: AuthUser = check(response).await?.json().await?;
        Ok(user.into())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0),
            (None, Some(seconds)) => Some(now + Duration::seconds(seconds)),
            (None, None) => None,
        };
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
            full_name: user.user_metadata.full_name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<Value>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

async fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status.as_u16(), &body))
}

/// Maps an error response onto [`ServiceError`]. Expired or invalid tokens
/// surface as 401s, PostgREST's `PGRST301`, or messages mentioning the JWT.
fn classify_failure(status: u16, body: &str) -> ServiceError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed
        .code
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| body.to_string());

    if status == 401 || code == "PGRST301" || message.contains("JWT") {
        ServiceError::Unauthorized(message)
    } else if status == 404 {
        ServiceError::NotFound(message)
    } else {
        ServiceError::Rejected { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryColor, User};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session {
            access_token: "token-1".into(),
            refresh_token: Some("refresh-1".into()),
            expires_at: None,
            user: User {
                id: "user-1".into(),
                email: "ada@example.com".into(),
                full_name: None,
            },
        }
    }

    #[test]
    fn failures_are_classified() {
        assert!(matches!(
            classify_failure(401, r#"{"message":"bad"}"#),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_failure(400, r#"{"code":"PGRST301","message":"JWT expired"}"#),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_failure(409, r#"{"code":"23505","message":"duplicate key"}"#),
            ServiceError::Rejected { status: 409, .. }
        ));
        assert!(matches!(
            classify_failure(400, r#"{"code":400,"msg":"Email not confirmed"}"#),
            ServiceError::Rejected { status: 400, ref message } if message == "Email not confirmed"
        ));
    }

    #[tokio::test]
    async fn lists_habits_with_joined_completions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/habits"))
            .and(query_param("select", "*,habit_completions(completed_at)"))
            .and(query_param("order", "created_at.asc"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "h1",
                    "user_id": "user-1",
                    "title": "Read",
                    "category": "c1",
                    "created_at": "2026-10-01T10:00:00+00:00",
                    "habit_completions": [{ "completed_at": "2026-10-14" }]
                }
            ])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon").unwrap();
        let rows = client.list_habits(&session()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].habit_completions[0].completed_at, "2026-10-14");
    }

    #[tokio::test]
    async fn inserts_completion_row_for_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/habit_completions"))
            .and(body_json(json!({
                "user_id": "user-1",
                "habit_id": "h1",
                "completed_at": "2026-10-15"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        client.insert_completion(&session(), "h1", date).await.unwrap();
    }

    #[tokio::test]
    async fn deletes_completion_by_habit_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/habit_completions"))
            .and(query_param("habit_id", "eq.h1"))
            .and(query_param("completed_at", "eq.2026-10-15"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": "PGRST301",
                "message": "JWT expired"
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let err = client
            .delete_completion(&session(), "h1", date)
            .await
            .unwrap_err();
        assert!(err.is_auth_related());
    }

    #[tokio::test]
    async fn orders_categories_default_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/categories"))
            .and(query_param("order", "is_default.desc,name.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "c1", "name": "Health", "color": "emerald", "is_default": true, "user_id": null },
                { "id": "c9", "name": "Pottery", "color": "teal", "is_default": false, "user_id": "user-1" }
            ])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon").unwrap();
        let categories = client.list_categories(&session()).await.unwrap();
        assert_eq!(categories[0].color, CategoryColor::Emerald);
        assert_eq!(categories[1].color, CategoryColor::Slate);
    }

    #[tokio::test]
    async fn password_sign_in_builds_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r1",
                "user": {
                    "id": "user-1",
                    "email": "ada@example.com",
                    "user_metadata": { "full_name": "Ada" }
                }
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon").unwrap();
        let credentials = Credentials {
            email: "ada@example.com".into(),
            password: "secret".into(),
        };
        let session = client.sign_in(&credentials).await.unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
        assert_eq!(session.user.display_name(), "Ada");
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn sign_up_without_session_requires_verification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-2",
                "email": "new@example.com",
                "confirmation_sent_at": "2026-10-15T09:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "anon").unwrap();
        let outcome = client
            .sign_up(&Credentials {
                email: "new@example.com".into(),
                password: "secret".into(),
            })
            .await
            .unwrap();
        assert!(outcome.verification_required);
    }
}
