pub mod answers;
pub mod forms;
pub mod migrate;
