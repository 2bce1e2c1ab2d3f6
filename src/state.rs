use crate::backend::DataService;
use crate::insights::Insights;
use crate::prefs::Preferences;
use crate::session::SessionContext;
use crate::workspace::Workspace;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub prefs_path: PathBuf,
    pub prefs: Arc<Mutex<Preferences>>,
    pub session: Arc<SessionContext>,
    pub data: Arc<dyn DataService>,
    pub workspace: Arc<Mutex<Workspace>>,
    pub insights: Arc<Insights>,
}

impl AppState {
    pub fn new(
        prefs_path: PathBuf,
        prefs: Preferences,
        session: SessionContext,
        data: Arc<dyn DataService>,
        insights: Insights,
    ) -> Self {
        Self {
            prefs_path,
            prefs: Arc::new(Mutex::new(prefs)),
            session: Arc::new(session),
            data,
            workspace: Arc::new(Mutex::new(Workspace::default())),
            insights: Arc::new(insights),
        }
    }

    pub async fn language(&self) -> crate::i18n::Language {
        self.prefs.lock().await.language
    }
}
