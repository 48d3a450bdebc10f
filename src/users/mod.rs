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

use crate::projects::Project;
use crate::shared::error::ApiError;
use crate::shared::models::schema::{comments, projects, tasks, users};
use crate::shared::state::AppState;
use crate::shared::utils::{validate_email, validate_length, PageParams};
use crate::tasks::types::Task;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
struct UserChanges {
    username: Option<String>,
    email: Option<String>,
    full_name: Option<String>,
    is_active: Option<bool>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct UserWithRelations {
    pub user: User,
    pub owned_projects: Vec<Project>,
    pub assigned_tasks: Vec<Task>,
    pub comment_count: i64,
}

pub fn user_exists(conn: &mut PgConnection, id: Uuid) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(users::table.find(id))).get_result(conn)
}

fn validate_fields(req: &UpdateUserRequest) -> Result<(), ApiError> {
    if let Some(username) = &req.username {
        validate_length("username", username, 3, 50)?;
    }
    if let Some(email) = &req.email {
        validate_email(email)?;
    }
    if let Some(full_name) = &req.full_name {
        validate_length("full_name", full_name, 0, 100)?;
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> Result<Json<UserListResponse>, ApiError> {
    let mut conn = state.conn.get()?;

    let total: i64 = users::table.count().get_result(&mut conn)?;
    let rows: Vec<User> = users::table
        .order((users::created_at.asc(), users::id.asc()))
        .offset(page.skip())
        .limit(page.limit())
        .load(&mut conn)?;

    Ok(Json(UserListResponse {
        users: rows,
        total,
        skip: page.skip(),
        limit: page.limit(),
    }))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    validate_length("username", &req.username, 3, 50)?;
    validate_email(&req.email)?;
    if let Some(full_name) = &req.full_name {
        validate_length("full_name", full_name, 0, 100)?;
    }

    let mut conn = state.conn.get()?;
    let now = Utc::now();

    let user = User {
        id: Uuid::new_v4(),
        username: req.username,
        email: req.email,
        full_name: req.full_name,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)?;

    info!("Created user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserWithRelations>, ApiError> {
    let mut conn = state.conn.get()?;

    let user: User = users::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let owned_projects: Vec<Project> = projects::table
        .filter(projects::owner_id.eq(id))
        .order(projects::created_at.asc())
        .load(&mut conn)?;

    let assigned_tasks: Vec<Task> = tasks::table
        .filter(tasks::assignee_id.eq(id))
        .order((tasks::created_at.asc(), tasks::id.asc()))
        .load(&mut conn)?;

    let comment_count: i64 = comments::table
        .filter(comments::author_id.eq(id))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(UserWithRelations {
        user,
        owned_projects,
        assigned_tasks,
        comment_count,
    }))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    validate_fields(&req)?;

    let mut conn = state.conn.get()?;

    if !user_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let changes = UserChanges {
        username: req.username,
        email: req.email,
        full_name: req.full_name,
        is_active: req.is_active,
        updated_at: Some(Utc::now()),
    };

    diesel::update(users::table.find(id))
        .set(&changes)
        .execute(&mut conn)?;

    let user: User = users::table.find(id).first(&mut conn)?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn.get()?;

    let deleted = diesel::delete(users::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!("Deleted user {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}
