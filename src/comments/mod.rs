use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::error::ApiError;
use crate::shared::models::schema::{comments, users};
use crate::shared::state::AppState;
use crate::shared::utils::validate_length;
use crate::tasks::task_exists;
use crate::users::{user_exists, User};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentWithRelations {
    pub comment: Comment,
    pub author: Option<User>,
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    validate_length("content", &req.content, 1, 1000)?;

    let mut conn = state.conn.get()?;

    if !task_exists(&mut conn, req.task_id)? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }
    if !user_exists(&mut conn, req.author_id)? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        task_id: req.task_id,
        author_id: req.author_id,
        content: req.content,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(comments::table)
        .values(&comment)
        .execute(&mut conn)?;

    info!("Created comment {} on task {}", comment.id, comment.task_id);
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommentWithRelations>, ApiError> {
    let mut conn = state.conn.get()?;

    let comment: Comment = comments::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    let author: Option<User> = users::table
        .find(comment.author_id)
        .first(&mut conn)
        .optional()?;

    Ok(Json(CommentWithRelations { comment, author }))
}

pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let mut conn = state.conn.get()?;

    if let Some(content) = req.content {
        validate_length("content", &content, 1, 1000)?;
        let updated = diesel::update(comments::table.find(id))
            .set((
                comments::content.eq(content),
                comments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(ApiError::NotFound("Comment not found".to_string()));
        }
    }

    let comment: Comment = comments::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn.get()?;

    let deleted = diesel::delete(comments::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    info!("Deleted comment {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_comments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/", post(create_comment))
        .route(
            "/comments/:id",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}
