//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod category;
pub mod post;
pub mod tag;
pub mod unique;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use unique::{SqlxUniqueLookup, UniqueLookup};
pub use user::{SqlxUserRepository, UserRepository};

/// Integrity constraint that rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    Unique,
    ForeignKey,
}

/// Classify a repository error raised by a constraint violation.
///
/// Walks the context chain down to the `sqlx::Error`, so errors wrapped
/// with `.context(..)` are still recognised.
pub fn constraint_violation(err: &anyhow::Error) -> Option<ConstraintViolation> {
    let db_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<sqlx::Error>())?
        .as_database_error()?;

    if db_err.is_unique_violation() {
        Some(ConstraintViolation::Unique)
    } else if db_err.is_foreign_key_violation() {
        Some(ConstraintViolation::ForeignKey)
    } else {
        None
    }
}
