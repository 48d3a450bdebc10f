use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::error::ApiError;
use crate::shared::models::schema::tags;
use crate::shared::state::AppState;
use crate::shared::utils::{validate_hex_color, validate_length, PageParams};

pub const DEFAULT_TAG_COLOR: &str = "#3498db";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = tags)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tags)]
struct TagChanges {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<Tag>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

fn validate_fields(name: Option<&String>, color: Option<&String>) -> Result<(), ApiError> {
    if let Some(name) = name {
        validate_length("name", name, 1, 50)?;
    }
    if let Some(color) = color {
        validate_hex_color(color)?;
    }
    Ok(())
}

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> Result<Json<TagListResponse>, ApiError> {
    let mut conn = state.conn.get()?;

    let total: i64 = tags::table.count().get_result(&mut conn)?;
    let rows: Vec<Tag> = tags::table
        .order(tags::name.asc())
        .offset(page.skip())
        .limit(page.limit())
        .load(&mut conn)?;

    Ok(Json(TagListResponse {
        tags: rows,
        total,
        skip: page.skip(),
        limit: page.limit(),
    }))
}

pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    validate_fields(Some(&req.name), req.color.as_ref())?;

    let mut conn = state.conn.get()?;

    let tag = Tag {
        id: Uuid::new_v4(),
        name: req.name,
        color: req.color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
        created_at: Utc::now(),
    };

    diesel::insert_into(tags::table)
        .values(&tag)
        .execute(&mut conn)?;

    info!("Created tag {} ({})", tag.name, tag.id);
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tag>, ApiError> {
    let mut conn = state.conn.get()?;

    let tag: Tag = tags::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Tag not found".to_string()))?;

    Ok(Json(tag))
}

pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTagRequest>,
) -> Result<Json<Tag>, ApiError> {
    validate_fields(req.name.as_ref(), req.color.as_ref())?;

    let mut conn = state.conn.get()?;

    if req.name.is_some() || req.color.is_some() {
        let changes = TagChanges {
            name: req.name,
            color: req.color,
        };
        let updated = diesel::update(tags::table.find(id))
            .set(&changes)
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(ApiError::NotFound("Tag not found".to_string()));
        }
    }

    let tag: Tag = tags::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Tag not found".to_string()))?;
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn.get()?;

    let deleted = diesel::delete(tags::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Tag not found".to_string()));
    }

    info!("Deleted tag {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_tags_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/", get(list_tags).post(create_tag))
        .route("/tags/:id", get(get_tag).put(update_tag).delete(delete_tag))
}
