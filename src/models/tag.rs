//! Tag model
//!
//! Tags relate to posts many-to-many through the `post_tag` join table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Tag name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Create a new Tag.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(name: String) -> Self {
        Self {
            id: 0,
            name,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a post/tag association sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSyncChanges {
    /// Tag ids newly linked to the post
    pub attached: Vec<i64>,
    /// Tag ids unlinked from the post
    pub detached: Vec<i64>,
}

impl TagSyncChanges {
    /// True when the sync did not touch the join table
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new() {
        let tag = Tag::new("Rust".to_string());

        assert_eq!(tag.id, 0);
        assert_eq!(tag.name, "Rust");
    }

    #[test]
    fn test_sync_changes_is_empty() {
        assert!(TagSyncChanges::default().is_empty());

        let changes = TagSyncChanges {
            attached: vec![1],
            detached: vec![],
        };
        assert!(!changes.is_empty());
    }
}
