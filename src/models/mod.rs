//! Data models
//!
//! This module contains the data structures used throughout the post service.
//! Models represent:
//! - Database entities (Post, Category, Tag, User)
//! - Submitted form data (PostForm, UploadedImage)
//! - Internal data transfer objects (PostRecord, TagSyncChanges, pagination)

mod category;
mod post;
mod tag;
mod user;

pub use category::Category;
pub use post::{FieldValue, ListParams, PagedResult, Post, PostForm, PostRecord, UploadedImage};
pub use tag::{Tag, TagSyncChanges};
pub use user::User;
