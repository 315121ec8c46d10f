//! Post service
//!
//! Implements business logic for blog posts:
//! - Listing, showing, creating, updating and deleting posts
//! - Form validation and body sanitization
//! - Featured image storage and cleanup
//! - Tag associations
//! - Post-created notifications and flash messages
//!
//! Every mutation validates first; nothing is written when validation fails.

use crate::db::repositories::{
    constraint_violation, CategoryRepository, ConstraintViolation, PostRepository, TagRepository,
};
use crate::models::{ListParams, PagedResult, Post, PostForm, PostRecord, Tag, UploadedImage, User};
use crate::services::flash::FlashStore;
use crate::services::image::{ImageError, ImageStore, StoredImage};
use crate::services::notification::{NotificationDispatcher, PostCreatedEvent};
use crate::services::sanitizer::HtmlSanitizer;
use crate::services::validation::{
    compute_validation_rules, store_rules, RuleParseError, RuleSet, ValidationErrors, Validator,
};
use anyhow::anyhow;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Posts per index page
pub const POSTS_PER_PAGE: u32 = 10;

pub const STORED_MESSAGE: &str = "The blog post was successfully save!";
pub const UPDATED_MESSAGE: &str = "This post was successfully saved.";
pub const DELETED_MESSAGE: &str = "The post was successfully deleted.";

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Field-level validation failures
    #[error("Validation error: {0}")]
    ValidationError(ValidationErrors),

    /// Image could not be stored
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<RuleParseError> for PostServiceError {
    fn from(e: RuleParseError) -> Self {
        PostServiceError::InternalError(anyhow!(e))
    }
}

/// Id-to-name maps for the category and tag selectors
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormOptions {
    pub categories: BTreeMap<i64, String>,
    pub tags: BTreeMap<i64, String>,
}

/// A post together with its tags
#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    pub post: Post,
    pub tags: Vec<Tag>,
}

/// Everything the edit form needs
#[derive(Debug, Clone, Serialize)]
pub struct EditForm {
    pub post: Post,
    pub tag_ids: Vec<i64>,
    pub options: FormOptions,
}

/// Form fields after validation
struct ValidatedFields {
    title: String,
    slug: String,
    category_id: i64,
    body: String,
}

/// Post service for managing blog posts
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    tags: Arc<dyn TagRepository>,
    categories: Arc<dyn CategoryRepository>,
    validator: Validator,
    sanitizer: HtmlSanitizer,
    images: ImageStore,
    notifications: NotificationDispatcher,
    flash: FlashStore,
}

impl PostService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posts: Arc<dyn PostRepository>,
        tags: Arc<dyn TagRepository>,
        categories: Arc<dyn CategoryRepository>,
        validator: Validator,
        sanitizer: HtmlSanitizer,
        images: ImageStore,
        notifications: NotificationDispatcher,
        flash: FlashStore,
    ) -> Self {
        Self {
            posts,
            tags,
            categories,
            validator,
            sanitizer,
            images,
            notifications,
            flash,
        }
    }

    /// Posts newest first, `POSTS_PER_PAGE` per page
    pub async fn index(&self, page: u32) -> Result<PagedResult<Post>, PostServiceError> {
        let params = ListParams::new(page, POSTS_PER_PAGE);
        let items = self.posts.list(&params).await?;
        let total = self.posts.count().await?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Category and tag choices for the create and edit forms
    pub async fn form_options(&self) -> Result<FormOptions, PostServiceError> {
        let categories = self
            .categories
            .list()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let tags = self
            .tags
            .list()
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();
        Ok(FormOptions { categories, tags })
    }

    /// Validate and create a post, then notify its author
    pub async fn store(&self, form: PostForm, user: &User) -> Result<Post, PostServiceError> {
        let rules = store_rules()?;
        self.check(&rules, &form).await?;
        let fields = self.validated_fields(&form)?;

        let image = match form.valid_image() {
            Some(upload) => Some(self.save_image(upload).await?),
            None => None,
        };

        let record = PostRecord {
            title: fields.title,
            slug: fields.slug,
            category_id: fields.category_id,
            body: fields.body,
            image,
        };
        let post = match self.posts.create(&record).await {
            Ok(post) => post,
            Err(e) => {
                if let Some(path) = &record.image {
                    tracing::warn!("Post insert failed, image {} is left without a post", path);
                }
                return Err(map_write_error(e));
            }
        };

        // The row exists from here on, so the event goes out even if tagging fails
        let tagged = match &form.tags {
            Some(tag_ids) => self.posts.sync_tags(post.id, tag_ids, false).await.map(|_| ()),
            None => Ok(()),
        };

        tracing::info!("Post {} created by user {}", post.id, user.id);
        self.notifications.dispatch(PostCreatedEvent {
            post: post.clone(),
            user: user.clone(),
        });
        self.flash.flash(user.id, STORED_MESSAGE).await;

        if let Err(e) = tagged {
            tracing::error!("Post {} created but tag sync failed: {:#}", post.id, e);
            return Err(e.into());
        }
        Ok(post)
    }

    /// A post and its tags
    pub async fn show(&self, id: i64) -> Result<PostDetails, PostServiceError> {
        let post = self.find(id).await?;
        let tags = self.tags.get_by_post_id(id).await?;
        Ok(PostDetails { post, tags })
    }

    /// The post's stored image, if it has one that still exists
    pub async fn image(&self, id: i64) -> Result<Option<StoredImage>, PostServiceError> {
        let post = self.find(id).await?;
        match post.image {
            Some(path) => Ok(self.images.read_image(&path).await?),
            None => Ok(None),
        }
    }

    /// A post with its current tags and the form choices
    pub async fn edit(&self, id: i64) -> Result<EditForm, PostServiceError> {
        let post = self.find(id).await?;
        let tag_ids = self.posts.tag_ids(id).await?;
        let options = self.form_options().await?;
        Ok(EditForm {
            post,
            tag_ids,
            options,
        })
    }

    /// Validate and apply an edit.
    ///
    /// A new image replaces the old one, which is removed from the store
    /// after the row is written. If the write fails the new image is
    /// removed instead. Tags are replaced wholesale; leaving the tags field out
    /// clears them.
    pub async fn update(
        &self,
        id: i64,
        form: PostForm,
        user: &User,
    ) -> Result<Post, PostServiceError> {
        let existing = self.find(id).await?;

        let rules = compute_validation_rules(&form, &existing.slug)?;
        self.check(&rules, &form).await?;
        let fields = self.validated_fields(&form)?;

        let new_image = match form.valid_image() {
            Some(upload) => Some(self.save_image(upload).await?),
            None => None,
        };

        let record = PostRecord {
            title: fields.title,
            slug: fields.slug,
            category_id: fields.category_id,
            body: fields.body,
            image: new_image.clone().or_else(|| existing.image.clone()),
        };
        let written = match self.posts.update(id, &record).await {
            Ok(Some(post)) => Ok(post),
            Ok(None) => Err(PostServiceError::NotFound(id)),
            Err(e) => Err(map_write_error(e)),
        };

        // The old image goes only once the row points at the new one
        let post = match (written, new_image) {
            (Ok(post), Some(_)) => {
                if let Some(old) = &existing.image {
                    self.remove_image(old).await;
                }
                post
            }
            (Ok(post), None) => post,
            (Err(e), Some(path)) => {
                self.remove_image(&path).await;
                return Err(e);
            }
            (Err(e), None) => return Err(e),
        };

        let tag_ids = form.tags.unwrap_or_default();
        let changes = self.posts.sync_tags(id, &tag_ids, true).await?;
        tracing::debug!(
            "Post {} tags: attached {:?}, detached {:?}",
            id,
            changes.attached,
            changes.detached
        );

        tracing::info!("Post {} updated by user {}", id, user.id);
        self.flash.flash(user.id, UPDATED_MESSAGE).await;

        Ok(post)
    }

    /// Delete a post, its tag links and its stored image
    pub async fn destroy(&self, id: i64, user: &User) -> Result<(), PostServiceError> {
        let existing = self.find(id).await?;

        self.posts.detach_all_tags(id).await?;
        if !self.posts.delete(id).await? {
            return Err(PostServiceError::NotFound(id));
        }
        if let Some(path) = &existing.image {
            self.remove_image(path).await;
        }

        tracing::info!("Post {} deleted by user {}", id, user.id);
        self.flash.flash(user.id, DELETED_MESSAGE).await;

        Ok(())
    }

    /// The flash store messages are written to
    pub fn flash(&self) -> &FlashStore {
        &self.flash
    }

    async fn find(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await?
            .ok_or(PostServiceError::NotFound(id))
    }

    async fn check(&self, rules: &RuleSet, form: &PostForm) -> Result<(), PostServiceError> {
        let errors = self.validator.validate(rules, form).await?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PostServiceError::ValidationError(errors))
        }
    }

    fn validated_fields(&self, form: &PostForm) -> Result<ValidatedFields, PostServiceError> {
        let text = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .map(|v| v.trim().to_string())
                .ok_or_else(|| anyhow!("{} missing after validation", field))
        };

        let category_id = text(&form.category_id, "category_id")?
            .parse::<i64>()
            .map_err(|e| anyhow!("category_id not an integer after validation: {}", e))?;

        Ok(ValidatedFields {
            title: text(&form.title, "title")?,
            slug: text(&form.slug, "slug")?,
            category_id,
            body: self.sanitizer.clean(form.body.as_deref().unwrap_or_default()),
        })
    }

    async fn save_image(&self, upload: &UploadedImage) -> Result<String, PostServiceError> {
        match self.images.save_image(upload).await {
            Ok(path) => Ok(path),
            Err(ImageError::Processing(reason)) => {
                tracing::debug!("Rejected featured image {}: {}", upload.file_name(), reason);
                Err(PostServiceError::ValidationError(ValidationErrors::single(
                    "featured_img",
                    "The featured img must be an image.",
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delete; a failure only leaves an orphaned file
    async fn remove_image(&self, path: &str) {
        match self.images.delete_image(path).await {
            Ok(true) => tracing::debug!("Removed image {}", path),
            Ok(false) => tracing::debug!("Image {} was already gone", path),
            Err(e) => tracing::warn!("Failed to remove image {}: {}", path, e),
        }
    }
}

/// Turn constraint violations that slipped past validation into field errors
fn map_write_error(err: anyhow::Error) -> PostServiceError {
    match constraint_violation(&err) {
        Some(ConstraintViolation::Unique) => PostServiceError::ValidationError(
            ValidationErrors::single("slug", "The slug has already been taken."),
        ),
        Some(ConstraintViolation::ForeignKey) => PostServiceError::ValidationError(
            ValidationErrors::single("category_id", "The selected category id is invalid."),
        ),
        None => PostServiceError::InternalError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageConfig;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxPostRepository, SqlxTagRepository, SqlxUniqueLookup,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::Category;
    use crate::models::{ListParams, TagSyncChanges};
    use crate::services::image::date_folder;
    use crate::services::storage::LocalContentStore;
    use chrono::Utc;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Harness {
        _dir: TempDir,
        pool: DynDatabasePool,
        service: PostService,
        events: mpsc::UnboundedReceiver<PostCreatedEvent>,
        user: User,
        category_id: i64,
        storage_root: std::path::PathBuf,
    }

    async fn setup() -> Harness {
        setup_with(SqlxPostRepository::boxed).await
    }

    async fn setup_with(posts: fn(DynDatabasePool) -> Arc<dyn PostRepository>) -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let dir = TempDir::new().unwrap();

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("Ada".to_string(), "ada@example.com".to_string()))
            .await
            .unwrap();
        let category_id = SqlxCategoryRepository::new(pool.clone())
            .create(&Category::new("General".to_string()))
            .await
            .unwrap()
            .id;

        let (notifications, events) = NotificationDispatcher::channel();
        let service = PostService::new(
            posts(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            Validator::new(SqlxUniqueLookup::boxed(pool.clone())),
            HtmlSanitizer::new(),
            ImageStore::new(
                LocalContentStore::boxed(dir.path()),
                ImageConfig {
                    width: 32,
                    height: 16,
                },
            ),
            notifications,
            FlashStore::new(Duration::from_secs(60)),
        );

        Harness {
            storage_root: dir.path().to_path_buf(),
            _dir: dir,
            pool,
            service,
            events,
            user,
            category_id,
        }
    }

    impl Harness {
        async fn tag(&self, name: &str) -> i64 {
            SqlxTagRepository::new(self.pool.clone())
                .create(&Tag::new(name.to_string()))
                .await
                .unwrap()
                .id
        }

        fn stored(&self, path: &str) -> bool {
            self.storage_root.join(path.trim_start_matches('/')).exists()
        }

        fn form(&self, slug: &str) -> PostForm {
            PostForm::default()
                .with_title("Hello")
                .with_slug(slug)
                .with_category_id(self.category_id)
                .with_body("<p>Hi</p>")
                .with_image(png("photo.png"))
        }

        async fn post_tag_rows(&self, post_id: i64) -> i64 {
            sqlx::query_scalar("SELECT COUNT(*) FROM post_tag WHERE post_id = ?")
                .bind(post_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .unwrap()
        }
    }

    fn png(name: &str) -> UploadedImage {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        UploadedImage::new(name, Some("image/png".to_string()), out.into_inner())
    }

    fn field_errors(err: PostServiceError) -> ValidationErrors {
        match err {
            PostServiceError::ValidationError(errors) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_sanitizes_and_notifies_once() {
        let mut h = setup().await;
        let form = h.form("hello-world").with_body("<script>x</script>Hi");

        let post = h.service.store(form, &h.user).await.unwrap();

        assert_eq!(post.title, "Hello");
        assert_eq!(post.category_id, h.category_id);
        assert!(!post.body.contains("<script"));
        assert!(post.body.contains("Hi"));
        assert!(h.stored(post.image.as_deref().unwrap()));

        let event = h.events.try_recv().unwrap();
        assert_eq!(event.post.id, post.id);
        assert_eq!(event.user.id, h.user.id);
        assert!(h.events.try_recv().is_err());

        assert_eq!(h.service.flash().take(h.user.id).await.as_deref(), Some(STORED_MESSAGE));
    }

    #[tokio::test]
    async fn test_store_attaches_submitted_tags() {
        let h = setup().await;
        let a = h.tag("a").await;
        let b = h.tag("b").await;

        let post = h
            .service
            .store(h.form("tagged-post").with_tags(vec![b, a]), &h.user)
            .await
            .unwrap();

        let details = h.service.show(post.id).await.unwrap();
        let ids: Vec<i64> = details.tags.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn test_store_validation_failure_writes_nothing() {
        let mut h = setup().await;
        let mut form = h.form("bad");
        form.title = None;

        let errors = field_errors(h.service.store(form, &h.user).await.unwrap_err());

        assert!(errors.has("title"));
        assert!(errors.has("slug"));
        assert_eq!(h.service.index(1).await.unwrap().total, 0);
        assert!(h.events.try_recv().is_err());
        assert!(h.service.flash().take(h.user.id).await.is_none());
    }

    #[tokio::test]
    async fn test_store_duplicate_slug_rejected() {
        let h = setup().await;
        h.service.store(h.form("same-slug"), &h.user).await.unwrap();

        let errors = field_errors(h.service.store(h.form("same-slug"), &h.user).await.unwrap_err());

        assert_eq!(errors.get("slug"), ["The slug has already been taken."]);
    }

    #[tokio::test]
    async fn test_store_unknown_category_is_field_error() {
        let h = setup().await;
        let form = h.form("no-category").with_category_id(999);

        let errors = field_errors(h.service.store(form, &h.user).await.unwrap_err());

        assert!(errors.has("category_id"));
    }

    #[tokio::test]
    async fn test_store_rejects_non_image_upload() {
        let h = setup().await;
        let form = h
            .form("not-an-image")
            .with_image(UploadedImage::new("notes.png", None, b"plain text".to_vec()));

        let errors = field_errors(h.service.store(form, &h.user).await.unwrap_err());

        assert!(errors.has("featured_img"));
    }

    #[tokio::test]
    async fn test_index_pages_newest_first() {
        let h = setup().await;
        for i in 0..11 {
            h.service
                .store(h.form(&format!("post-number-{}", i)), &h.user)
                .await
                .unwrap();
        }

        let first = h.service.index(1).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total, 11);
        assert_eq!(first.items[0].slug, "post-number-10");
        assert_eq!(first.total_pages(), 2);

        let second = h.service.index(2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].slug, "post-number-0");
    }

    #[tokio::test]
    async fn test_show_missing_post() {
        let h = setup().await;
        assert!(matches!(
            h.service.show(42).await,
            Err(PostServiceError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_form_options_and_edit() {
        let h = setup().await;
        let rust = h.tag("rust").await;
        let post = h
            .service
            .store(h.form("editable").with_tags(vec![rust]), &h.user)
            .await
            .unwrap();

        let edit = h.service.edit(post.id).await.unwrap();

        assert_eq!(edit.post.id, post.id);
        assert_eq!(edit.tag_ids, vec![rust]);
        assert_eq!(edit.options.categories.get(&h.category_id).map(String::as_str), Some("General"));
        assert_eq!(edit.options.tags.get(&rust).map(String::as_str), Some("rust"));
    }

    #[tokio::test]
    async fn test_update_with_unchanged_slug_passes_uniqueness() {
        let h = setup().await;
        let post = h.service.store(h.form("keep-slug"), &h.user).await.unwrap();
        let mut form = h.form("keep-slug").with_title("Edited");
        form.featured_img = None;

        let updated = h.service.update(post.id, form, &h.user).await.unwrap();

        assert_eq!(updated.title, "Edited");
        assert_eq!(updated.image, post.image);
        assert_eq!(h.service.flash().take(h.user.id).await.as_deref(), Some(UPDATED_MESSAGE));
    }

    #[tokio::test]
    async fn test_update_to_taken_slug_rejected() {
        let h = setup().await;
        h.service.store(h.form("first-slug"), &h.user).await.unwrap();
        let second = h.service.store(h.form("second-slug"), &h.user).await.unwrap();

        let err = h
            .service
            .update(second.id, h.form("first-slug"), &h.user)
            .await
            .unwrap_err();

        assert!(field_errors(err).has("slug"));
    }

    #[tokio::test]
    async fn test_update_replaces_image() {
        let h = setup().await;
        let post = h.service.store(h.form("with-image"), &h.user).await.unwrap();
        let old_path = post.image.clone().unwrap();

        let form = h.form("with-image").with_image(png("photo.png"));
        let updated = h.service.update(post.id, form, &h.user).await.unwrap();
        let new_path = updated.image.clone().unwrap();

        assert_ne!(new_path, old_path);
        assert!(h.stored(&new_path));
        assert!(!h.stored(&old_path));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_old_image() {
        let h = setup().await;
        let post = h.service.store(h.form("keep-image"), &h.user).await.unwrap();
        let old_path = post.image.clone().unwrap();

        let mut form = h.form("keep-image").with_image(png("photo.png"));
        form.category_id = Some("999".to_string());
        let err = h.service.update(post.id, form, &h.user).await.unwrap_err();

        assert!(field_errors(err).has("category_id"));
        let row = h.service.show(post.id).await.unwrap().post;
        assert_eq!(row.image.as_deref(), Some(old_path.as_str()));
        assert!(h.stored(&old_path));
        let folder = h.storage_root.join(date_folder(Utc::now().date_naive()).trim_matches('/'));
        assert_eq!(std::fs::read_dir(folder).unwrap().count(), 1);
    }

    /// Delegates to SQLite but fails every tag sync
    struct FailingTagSync(SqlxPostRepository);

    #[async_trait::async_trait]
    impl PostRepository for FailingTagSync {
        async fn create(&self, record: &PostRecord) -> anyhow::Result<Post> {
            self.0.create(record).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Post>> {
            self.0.get_by_id(id).await
        }
        async fn list(&self, params: &ListParams) -> anyhow::Result<Vec<Post>> {
            self.0.list(params).await
        }
        async fn count(&self) -> anyhow::Result<i64> {
            self.0.count().await
        }
        async fn update(&self, id: i64, record: &PostRecord) -> anyhow::Result<Option<Post>> {
            self.0.update(id, record).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.0.delete(id).await
        }
        async fn sync_tags(
            &self,
            _post_id: i64,
            _tag_ids: &[i64],
            _detaching: bool,
        ) -> anyhow::Result<TagSyncChanges> {
            Err(anyhow!("post_tag unavailable"))
        }
        async fn detach_all_tags(&self, post_id: i64) -> anyhow::Result<u64> {
            self.0.detach_all_tags(post_id).await
        }
        async fn tag_ids(&self, post_id: i64) -> anyhow::Result<Vec<i64>> {
            self.0.tag_ids(post_id).await
        }
    }

    #[tokio::test]
    async fn test_store_notifies_even_when_tag_sync_fails() {
        let mut h = setup_with(|pool: DynDatabasePool| -> Arc<dyn PostRepository> {
            Arc::new(FailingTagSync(SqlxPostRepository::new(pool)))
        })
        .await;
        let form = h.form("tag-failure").with_tags(vec![1]);

        let err = h.service.store(form, &h.user).await.unwrap_err();

        assert!(matches!(err, PostServiceError::InternalError(_)));
        let event = h.events.try_recv().unwrap();
        assert_eq!(event.post.slug, "tag-failure");
        assert_eq!(
            h.service.flash().take(h.user.id).await.as_deref(),
            Some(STORED_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_update_without_tags_field_clears_tags() {
        let h = setup().await;
        let a = h.tag("a").await;
        let post = h
            .service
            .store(h.form("clear-tags").with_tags(vec![a]), &h.user)
            .await
            .unwrap();

        let mut form = h.form("clear-tags");
        form.tags = None;
        h.service.update(post.id, form, &h.user).await.unwrap();

        assert_eq!(h.post_tag_rows(post.id).await, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_tag_set() {
        let h = setup().await;
        let a = h.tag("a").await;
        let b = h.tag("b").await;
        let post = h
            .service
            .store(h.form("swap-tags").with_tags(vec![a]), &h.user)
            .await
            .unwrap();

        h.service
            .update(post.id, h.form("swap-tags").with_tags(vec![b]), &h.user)
            .await
            .unwrap();

        assert_eq!(h.service.edit(post.id).await.unwrap().tag_ids, vec![b]);
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let h = setup().await;
        let err = h.service.update(7, h.form("whatever"), &h.user).await.unwrap_err();
        assert!(matches!(err, PostServiceError::NotFound(7)));
    }

    #[tokio::test]
    async fn test_destroy_removes_post_links_and_image() {
        let h = setup().await;
        let a = h.tag("a").await;
        let post = h
            .service
            .store(h.form("doomed-post").with_tags(vec![a]), &h.user)
            .await
            .unwrap();
        let path = post.image.clone().unwrap();

        h.service.destroy(post.id, &h.user).await.unwrap();

        assert!(matches!(
            h.service.show(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert_eq!(h.post_tag_rows(post.id).await, 0);
        assert!(!h.stored(&path));
        assert_eq!(h.service.flash().take(h.user.id).await.as_deref(), Some(DELETED_MESSAGE));

        assert!(matches!(
            h.service.destroy(post.id, &h.user).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_image_lookup() {
        let h = setup().await;
        let post = h.service.store(h.form("image-post"), &h.user).await.unwrap();

        let stored = h.service.image(post.id).await.unwrap().unwrap();
        assert_eq!(stored.content_type, "image/png");

        std::fs::remove_file(h.storage_root.join(post.image.unwrap().trim_start_matches('/')))
            .unwrap();
        assert!(h.service.image(post.id).await.unwrap().is_none());
    }
}
