//! Post API endpoints
//!
//! Form routes for blog posts. View routes answer with JSON view models
//! that carry the acting user's pending flash message; mutations answer
//! with a 303 redirect.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::config::UploadConfig;
use crate::models::{PostForm, UploadedImage};
use crate::services::ValidationErrors;

/// Build the post router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(index).post(store))
        .route("/posts/create", get(create))
        .route(
            "/posts/{id}",
            get(show).put(update).post(update).delete(destroy),
        )
        .route("/posts/{id}/edit", get(edit))
        .route("/posts/{id}/image", get(image))
}

/// Query parameters for the index page
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// A view model plus the pending flash message
#[derive(Debug, Serialize)]
pub struct View<T> {
    #[serde(flatten)]
    pub data: T,
    pub flash: Option<String>,
}

async fn view<T>(state: &AppState, user: &AuthenticatedUser, data: T) -> Json<View<T>> {
    let flash = state.post_service.flash().take(user.0.id).await;
    Json(View { data, flash })
}

fn show_redirect(id: i64) -> Redirect {
    Redirect::to(&format!("/posts/{}", id))
}

/// GET /posts
async fn index(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let posts = state.post_service.index(query.page.unwrap_or(1)).await?;
    let index = IndexView {
        total_pages: posts.total_pages(),
        has_next: posts.has_next(),
        has_prev: posts.has_prev(),
        posts,
    };
    Ok(view(&state, &user, index).await.into_response())
}

#[derive(Debug, Serialize)]
struct IndexView {
    posts: crate::models::PagedResult<crate::models::Post>,
    total_pages: u32,
    has_next: bool,
    has_prev: bool,
}

/// GET /posts/create
async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, ApiError> {
    let options = state.post_service.form_options().await?;
    Ok(view(&state, &user, options).await.into_response())
}

/// POST /posts
async fn store(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let form = read_post_form(multipart, &state.upload_config).await?;
    let post = state.post_service.store(form, &user.0).await?;
    Ok(show_redirect(post.id))
}

/// GET /posts/{id}
async fn show(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let details = state.post_service.show(id).await?;
    Ok(view(&state, &user, details).await.into_response())
}

/// GET /posts/{id}/image
///
/// The stored bytes, or a redirect to the placeholder when the post has
/// no image or the file is gone.
async fn image(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    match state.post_service.image(id).await? {
        Some(stored) => {
            Ok(([(header::CONTENT_TYPE, stored.content_type)], stored.bytes).into_response())
        }
        None => Ok(Redirect::to(&state.server_config.placeholder_image).into_response()),
    }
}

/// GET /posts/{id}/edit
async fn edit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let form = state.post_service.edit(id).await?;
    Ok(view(&state, &user, form).await.into_response())
}

/// PUT /posts/{id}, also reachable as POST for plain HTML forms
async fn update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let form = read_post_form(multipart, &state.upload_config).await?;
    let post = state.post_service.update(id, form, &user.0).await?;
    Ok(show_redirect(post.id))
}

/// DELETE /posts/{id}
async fn destroy(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Redirect, ApiError> {
    state.post_service.destroy(id, &user.0).await?;
    Ok(Redirect::to("/posts"))
}

// ============================================================================
// Multipart form parsing
// ============================================================================

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body too large")
    } else {
        ApiError::bad_request(format!("Failed to read multipart: {}", e.body_text()))
    }
}

/// Collect a create/update form from a multipart body.
///
/// `tags` and `tags[]` are repeatable; a tags field with an empty value
/// marks the selection as present but empty. A file part without a file
/// name counts as no upload.
pub async fn read_post_form(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> Result<PostForm, ApiError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        if name == "featured_img" {
            let filename = field.file_name().map(|s| s.to_string());
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field.bytes().await.map_err(multipart_error)?;

            let filename = match filename {
                Some(f) if !f.is_empty() => f,
                _ => continue,
            };
            if data.len() as u64 > config.max_file_size {
                return Err(ApiError::payload_too_large(format!(
                    "File too large. Maximum size: {} bytes",
                    config.max_file_size
                )));
            }
            if let Some(ct) = &content_type {
                if !config.is_type_allowed(ct) {
                    return Err(ApiError::validation_error(&ValidationErrors::single(
                        "featured_img",
                        "The featured img must be an image.",
                    )));
                }
            }
            form.featured_img = Some(UploadedImage::new(filename, content_type, data.to_vec()));
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "slug" => form.slug = Some(value),
            "category_id" => form.category_id = Some(value),
            "body" => form.body = Some(value),
            "tags" | "tags[]" => {
                let tags = form.tags.get_or_insert_with(Vec::new);
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                let id = value.parse::<i64>().map_err(|_| {
                    ApiError::validation_error(&ValidationErrors::single(
                        "tags",
                        "The selected tags is invalid.",
                    ))
                })?;
                tags.push(id);
            }
            other => tracing::debug!("Ignoring unknown form field {}", other),
        }
    }

    Ok(form)
}
