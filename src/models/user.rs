//! User model
//!
//! Users come from the authentication context. This service only reads
//! them to address notification e-mails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// E-mail address (unique)
    pub email: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(name: String, email: String) -> Self {
        Self {
            id: 0,
            name,
            email,
            created_at: Utc::now(),
        }
    }

    /// Mailbox string in `Name <address>` form
    pub fn mailbox(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}
