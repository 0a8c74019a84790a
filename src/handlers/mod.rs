// HTTP layer: public routes, then everything else behind bearer auth

pub mod answers;
pub mod forms;
pub mod public;
pub mod questions;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::auth::AuthSettings;
use crate::config::AppConfig;
use crate::database::SurveyStore;
use crate::middleware::jwt_auth_middleware;
use crate::services::{AggregationEngine, FormBuilder, FormCatalog, Persistence, SubmissionRecorder};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Persistence,
    pub builder: FormBuilder,
    pub recorder: SubmissionRecorder,
    pub aggregation: AggregationEngine,
    pub catalog: FormCatalog,
    pub auth: AuthSettings,
}

impl AppState {
    pub fn new(store: Arc<dyn SurveyStore>, config: &AppConfig) -> Self {
        Self::with_persistence(
            Persistence::from_config(store, &config.database),
            AuthSettings::from_config(&config.security),
        )
    }

    pub fn with_persistence(db: Persistence, auth: AuthSettings) -> Self {
        Self {
            builder: FormBuilder::new(db.clone()),
            recorder: SubmissionRecorder::new(db.clone()),
            aggregation: AggregationEngine::new(db.clone()),
            catalog: FormCatalog::new(db.clone()),
            db,
            auth,
        }
    }
}

/// Full router. Transport layers (CORS, tracing, body limit) are added by the binary.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(form_routes())
        .merge(question_routes())
        .merge(answer_routes())
        .layer(middleware::from_fn_with_state(state.auth.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected)
        .with_state(state)
}

fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/forms", get(forms::list))
        .route("/forms/create", post(forms::create))
        .route(
            "/forms/:id",
            get(forms::summary).patch(forms::update).delete(forms::delete),
        )
        .route("/forms/:id/show", get(forms::show))
        .route("/forms/:id/submit", post(answers::submit))
        .route("/forms/:id/answers", get(answers::form_results))
        .route("/forms/:id/questions/:qid/answers", get(answers::question_groups))
}

fn question_routes() -> Router<AppState> {
    Router::new()
        .route("/questions/create", post(questions::create))
        .route(
            "/questions/:id",
            get(questions::show).patch(questions::update).delete(questions::delete),
        )
}

fn answer_routes() -> Router<AppState> {
    Router::new()
        .route("/answers/me", get(answers::mine))
        .route("/users/:id/answers", get(answers::by_user))
}
