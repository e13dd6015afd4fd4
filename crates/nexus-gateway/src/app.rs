use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use nexus_core::{NexusError, TriggerDispatcher};
use nexus_github::GithubClient;
use nexus_lifecycle::{JobHistoryProvider, RunClassifier};
use nexus_services::{DeclarationFileProvider, ServiceReconciler};
use nexus_store::KvStore;

use crate::http;

/// Everything handlers need to reach the remote repository.
pub struct GithubBinding {
    pub dispatcher: Arc<dyn TriggerDispatcher>,
    pub history: Arc<dyn JobHistoryProvider>,
    pub files: Arc<dyn DeclarationFileProvider>,
    pub classifier: RunClassifier,
    pub services_path: String,
    pub run_limit: u32,
}

impl GithubBinding {
    pub fn from_client(client: Arc<GithubClient>) -> Self {
        let config = client.config();
        Self {
            classifier: RunClassifier::new(&config.workflows),
            services_path: config.services_path.clone(),
            run_limit: config.run_limit,
            dispatcher: client.clone(),
            history: client.clone(),
            files: client,
        }
    }
}

/// Shared state handed to every Axum handler as `Arc<AppState>`.
pub struct AppState {
    /// Scheduler settings and notification preferences (key/value half of the Config Store).
    pub settings: Arc<dyn KvStore>,
    pub services: ServiceReconciler,
    pub github: Option<GithubBinding>,
}

impl AppState {
    pub fn new(
        settings: Arc<dyn KvStore>,
        services: ServiceReconciler,
        github: Option<GithubBinding>,
    ) -> Self {
        Self {
            settings,
            services,
            github,
        }
    }

    /// The GitHub binding, or `NotConfigured` for endpoints that need it.
    pub fn github(&self) -> Result<&GithubBinding, NexusError> {
        self.github
            .as_ref()
            .ok_or_else(|| NexusError::NotConfigured("github".to_string()))
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route(
            "/api/scheduled-teardown",
            get(http::scheduler::get_schedule).post(http::scheduler::update_schedule),
        )
        .route(
            "/api/email-settings",
            get(http::notifications::get_preferences)
                .post(http::notifications::update_preferences),
        )
        .route(
            "/api/services",
            get(http::services::list_services).post(http::services::toggle_service),
        )
        .route("/api/services/init", post(http::services::init_services))
        .route(
            "/api/services/sync-deployed",
            post(http::services::sync_deployed),
        )
        .route(
            "/api/services/declared",
            post(http::services::toggle_declared),
        )
        .route("/api/status", get(http::status::status_handler))
        .route("/api/teardown", post(http::triggers::teardown))
        .route("/api/destroy", post(http::triggers::destroy))
        .route("/api/spin-up", post(http::triggers::spin_up))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
