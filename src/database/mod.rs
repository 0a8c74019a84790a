pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use manager::{with_timeout, DatabaseError, DatabaseManager};
pub use memory::InMemorySurveyStore;
pub use postgres::PgSurveyStore;
pub use repository::SurveyStore;
