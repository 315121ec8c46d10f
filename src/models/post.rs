//! Post model
//!
//! This module provides:
//! - `Post` entity representing a blog post
//! - `PostRecord`, the column values written on create and update
//! - `PostForm` and `UploadedImage`, the raw submitted form
//! - Pagination types for list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title
    pub title: String,
    /// URL-friendly slug, unique across posts
    pub slug: String,
    /// Category ID
    pub category_id: i64,
    /// Sanitized HTML body
    pub body: String,
    /// Content-store path of the featured image
    pub image: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Column values written when a post is created or updated
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub title: String,
    pub slug: String,
    pub category_id: i64,
    pub body: String,
    pub image: Option<String>,
}

/// An uploaded file as received from a multipart form
#[derive(Clone, PartialEq)]
pub struct UploadedImage {
    /// File name as sent by the client
    pub original_name: String,
    /// Declared MIME type
    pub content_type: Option<String>,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedImage")
            .field("original_name", &self.original_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadedImage {
    pub fn new(original_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            content_type,
            bytes,
        }
    }

    /// A usable upload carries bytes and a file name
    pub fn is_valid(&self) -> bool {
        !self.bytes.is_empty() && !self.file_name().is_empty()
    }

    /// Final path component of the client file name.
    ///
    /// Browsers on some platforms send full paths; those and any `..`
    /// segments are stripped so the name can never leave its folder.
    pub fn file_name(&self) -> &str {
        let name = self
            .original_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name == "." || name == ".." {
            ""
        } else {
            name
        }
    }

    /// Lower-cased extension of the client file name
    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name())
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Client file name without its extension
    pub fn stem(&self) -> &str {
        Path::new(self.file_name())
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// A submitted create/update form, before validation.
///
/// Every field is optional so that validation can report which ones are
/// missing. `tags` distinguishes an absent field (`None`) from an empty
/// selection (`Some(vec![])`).
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub category_id: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub featured_img: Option<UploadedImage>,
}

/// A single form field as seen by the validator
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Missing,
    Text(&'a str),
    File(&'a UploadedImage),
}

impl PostForm {
    /// Look up a field by its form name
    pub fn field(&self, name: &str) -> FieldValue<'_> {
        let text = match name {
            "title" => self.title.as_deref(),
            "slug" => self.slug.as_deref(),
            "category_id" => self.category_id.as_deref(),
            "body" => self.body.as_deref(),
            "featured_img" => {
                return self
                    .featured_img
                    .as_ref()
                    .map(FieldValue::File)
                    .unwrap_or(FieldValue::Missing)
            }
            _ => None,
        };
        text.map(FieldValue::Text).unwrap_or(FieldValue::Missing)
    }

    /// The uploaded image, if one was sent and is usable
    pub fn valid_image(&self) -> Option<&UploadedImage> {
        self.featured_img.as_ref().filter(|img| img.is_valid())
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_string());
        self
    }

    pub fn with_category_id(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn with_tags(mut self, tags: Vec<i64>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_image(mut self, image: UploadedImage) -> Self {
        self.featured_img = Some(image);
        self
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
