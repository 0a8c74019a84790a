// Survey core: forms, branching questions, answers and their aggregation

pub mod definition;
pub mod error;
pub mod model;

pub use definition::*;
pub use error::{SurveyError, ValidationError};
pub use model::*;
