/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

pub type UserId = i32;
pub type FormId = i32;
pub type QuestionId = i32;
pub type OptionId = i32;
pub type ExtensionId = i32;
pub type AnswerId = i32;

/// Caller identity supplied by the authentication layer.
/// The survey core trusts it as given and never authenticates on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Identity {
    pub fn member(user_id: UserId) -> Self {
        Self { user_id, is_admin: false }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self { user_id, is_admin: true }
    }

    /// Whether this identity may read data owned by `user_id`
    pub fn can_read_user(&self, user_id: UserId) -> bool {
        self.is_admin || self.user_id == user_id
    }
}
