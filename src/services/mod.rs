// Survey services: each wraps its storage calls in the configured deadline

pub mod aggregation;
pub mod catalog;
pub mod form_builder;
pub mod submission;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::database::{with_timeout, DatabaseError, SurveyStore};
use crate::survey::error::SurveyError;
use crate::types::Identity;

pub use aggregation::AggregationEngine;
pub use catalog::FormCatalog;
pub use form_builder::FormBuilder;
pub use submission::SubmissionRecorder;

/// Store handle shared by the services
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn SurveyStore>,
    timeout: Duration,
    slow_threshold: Option<Duration>,
}

impl Persistence {
    pub fn new(store: Arc<dyn SurveyStore>, timeout: Duration) -> Self {
        Self { store, timeout, slow_threshold: None }
    }

    pub fn from_config(store: Arc<dyn SurveyStore>, settings: &DatabaseConfig) -> Self {
        Self {
            store,
            timeout: settings.query_timeout(),
            slow_threshold: settings.slow_query_threshold(),
        }
    }

    pub fn store(&self) -> &dyn SurveyStore {
        self.store.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Await one storage call under the deadline
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, SurveyError>
    where
        F: Future<Output = Result<T, DatabaseError>>,
    {
        let started = Instant::now();
        let result = with_timeout(self.timeout, fut).await;

        if let Some(threshold) = self.slow_threshold {
            let elapsed = started.elapsed();
            if elapsed > threshold {
                warn!(op, elapsed_ms = elapsed.as_millis() as u64, "Slow storage call");
            }
        }
        Ok(result?)
    }
}

pub(crate) fn require_admin(identity: &Identity, action: &str) -> Result<(), SurveyError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(SurveyError::forbidden(format!("{} requires admin rights", action)))
    }
}
