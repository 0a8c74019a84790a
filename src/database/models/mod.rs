pub mod answer;
pub mod form;
pub mod question;

pub use answer::{AnswerRow, GroupAnswerRow};
pub use form::FormRow;
pub use question::{ExtensionRow, OptionRow, QuestionRow};
