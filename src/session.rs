use crate::backend::AuthService;
use crate::errors::{AppError, ServiceError};
use crate::models::{Credentials, Session, SignUpOutcome, User};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
    TokenRefreshed(User),
    UserUpdated(User),
}

/// Application-scoped identity: the active session plus a change channel
/// that other parts of the app subscribe to.
pub struct SessionContext {
    auth: Arc<dyn AuthService>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionContext {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            auth,
            current: RwLock::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// The active session, refreshed first when its token is about to expire.
    pub async fn require(&self) -> Result<Session, AppError> {
        let session = self
            .current
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::unauthorized("not signed in"))?;

        let threshold = Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS);
        if !session.is_expired_at(threshold) {
            return Ok(session);
        }
        match self.refresh(&session).await {
            Ok(refreshed) => Ok(refreshed),
            Err(err) => {
                warn!("session refresh failed: {err}");
                self.end_session().await;
                Err(AppError::unauthorized("session expired"))
            }
        }
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, ServiceError> {
        let outcome = self.auth.sign_up(credentials).await?;
        info!(
            verification_required = outcome.verification_required,
            "account created"
        );
        Ok(outcome)
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<User, ServiceError> {
        let session = self.auth.sign_in(credentials).await?;
        let user = session.user.clone();
        *self.current.write().await = Some(session);
        info!(user_id = %user.id, "signed in");
        self.emit(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) {
        let session = self.current.read().await.clone();
        if let Some(session) = session {
            if let Err(err) = self.auth.sign_out(&session).await {
                warn!("remote sign-out failed: {err}");
            }
        }
        self.end_session().await;
    }

    /// Re-validates the active session with the identity provider.
    ///
    /// A rejected token is refreshed once when possible; if that fails too
    /// the session ends. Transport failures leave the session in place.
    pub async fn verify(&self) -> Option<User> {
        let session = self.current.read().await.clone()?;

        match self.auth.get_user(&session.access_token).await {
            Ok(user) => {
                if let Some(active) = self.current.write().await.as_mut() {
                    active.user = user.clone();
                }
                Some(user)
            }
            Err(err) if err.is_auth_related() => match self.refresh(&session).await {
                Ok(refreshed) => Some(refreshed.user),
                Err(refresh_err) => {
                    info!("session no longer valid ({err}; {refresh_err}), signing out");
                    self.end_session().await;
                    None
                }
            },
            Err(err) => {
                warn!("could not verify session: {err}");
                Some(session.user)
            }
        }
    }

    pub async fn update_profile(&self, full_name: &str) -> Result<User, AppError> {
        let session = self.require().await?;
        let user = self
            .auth
            .update_profile(&session.access_token, full_name)
            .await?;
        if let Some(active) = self.current.write().await.as_mut() {
            active.user = user.clone();
        }
        self.emit(AuthEvent::UserUpdated(user.clone()));
        Ok(user)
    }

    async fn refresh(&self, session: &Session) -> Result<Session, ServiceError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| ServiceError::Unauthorized("no refresh token".into()))?;
        let refreshed = self.auth.refresh(refresh_token).await?;
        *self.current.write().await = Some(refreshed.clone());
        self.emit(AuthEvent::TokenRefreshed(refreshed.user.clone()));
        Ok(refreshed)
    }

    async fn end_session(&self) {
        let previous = self.current.write().await.take();
        if previous.is_some() {
            self.emit(AuthEvent::SignedOut);
        }
    }

    fn emit(&self, event: AuthEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn credentials() -> Credentials {
        Credentials {
            email: "grace@example.com".into(),
            password: "cobol1959".into(),
        }
    }

    async fn signed_in() -> (Arc<MemoryBackend>, SessionContext) {
        let backend = Arc::new(MemoryBackend::default());
        let context = SessionContext::new(backend.clone());
        context.sign_up(&credentials()).await.unwrap();
        context.sign_in(&credentials()).await.unwrap();
        (backend, context)
    }

    #[tokio::test]
    async fn sign_in_publishes_event() {
        let backend = Arc::new(MemoryBackend::default());
        let context = SessionContext::new(backend);
        let mut events = context.subscribe();

        context.sign_up(&credentials()).await.unwrap();
        let user = context.sign_in(&credentials()).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(u) if u.id == user.id));
        assert_eq!(context.current_user().await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn require_without_session_is_unauthorized() {
        let context = SessionContext::new(Arc::new(MemoryBackend::default()));
        let err = context.require().await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_refreshes_revoked_token() {
        let (backend, context) = signed_in().await;
        let before = context.require().await.unwrap().access_token;
        let mut events = context.subscribe();

        backend.revoke_access_tokens();
        assert!(context.verify().await.is_some());

        let after = context.require().await.unwrap().access_token;
        assert_ne!(before, after);
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::TokenRefreshed(_)));
    }

    #[tokio::test]
    async fn verify_signs_out_when_refresh_fails() {
        let (backend, context) = signed_in().await;
        let mut events = context.subscribe();

        backend.revoke_access_tokens();
        // Spend the refresh token so the second attempt is rejected.
        let session = context.require().await.unwrap();
        backend
            .refresh(session.refresh_token.as_deref().unwrap())
            .await
            .unwrap();
        backend.revoke_access_tokens();

        assert!(context.verify().await.is_none());
        assert!(context.current_user().await.is_none());
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_on_require() {
        let (_backend, context) = signed_in().await;
        let old = {
            let mut guard = context.current.write().await;
            let session = guard.as_mut().unwrap();
            session.expires_at = Some(Utc::now() - Duration::seconds(5));
            session.access_token.clone()
        };

        let session = context.require().await.unwrap();
        assert_ne!(session.access_token, old);
    }

    #[tokio::test]
    async fn profile_update_changes_display_name() {
        let (_backend, context) = signed_in().await;
        let user = context.update_profile("Grace Hopper").await.unwrap();
        assert_eq!(user.display_name(), "Grace Hopper");
        assert_eq!(
            context.current_user().await.unwrap().display_name(),
            "Grace Hopper"
        );
    }

    #[tokio::test]
    async fn sign_out_clears_session() {
        let (_backend, context) = signed_in().await;
        let mut events = context.subscribe();
        context.sign_out().await;
        assert!(context.current_user().await.is_none());
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    }
}
