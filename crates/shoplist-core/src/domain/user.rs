//! User entity

use serde::{Deserialize, Serialize};

use super::newtypes::{Email, UserId};

/// The signed-in user on whose behalf lists are read and written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
}

impl User {
    pub fn new(id: UserId, email: Email) -> Self {
        Self { id, email }
    }
}
