use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Query exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Run a storage future under a fixed deadline. Dropping the future on expiry
/// also drops any open sqlx transaction, which rolls it back.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Storage call exceeded deadline of {:?}", limit);
            Err(DatabaseError::Timeout(limit))
        }
    }
}

/// Connection pool manager, one pool per connection string
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Pool for the database named in DATABASE_URL
    pub async fn main_pool() -> Result<PgPool, DatabaseError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::instance().get_pool(&url).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, database_url: &str) -> Result<PgPool, DatabaseError> {
        let connection_string = Self::normalize_url(database_url)?;

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(&connection_string) {
                return Ok(pool.clone());
            }
        }

        let settings = &config::config().database;
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(&connection_string)
            .await?;

        {
            let mut pools = self.pools.write().await;
            pools.insert(connection_string.clone(), pool.clone());
        }

        info!("Created database pool for: {}", Self::redacted(&connection_string));
        Ok(pool)
    }

    /// Reject anything that is not a postgres URL with a database name
    fn normalize_url(database_url: &str) -> Result<String, DatabaseError> {
        let url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        if url.path().trim_start_matches('/').is_empty() {
            return Err(DatabaseError::ConfigMissing("database name in DATABASE_URL"));
        }
        Ok(url.into())
    }

    /// Connection string without the password, for logs
    fn redacted(connection_string: &str) -> String {
        match url::Url::parse(connection_string) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.into()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Survey schema is up to date");
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let manager = Self::instance();
        let mut pools = manager.pools.write().await;
        for (url, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", Self::redacted(&url));
        }
    }
}
