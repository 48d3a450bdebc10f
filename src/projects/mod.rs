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
use crate::shared::models::schema::{projects, tasks, users};
use crate::shared::state::AppState;
use crate::shared::utils::{validate_length, PageParams};
use crate::tasks::types::Task;
use crate::users::{user_exists, User};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = projects)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = projects)]
struct ProjectChanges {
    name: Option<String>,
    description: Option<String>,
    is_active: Option<bool>,
    owner_id: Option<Uuid>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct ProjectWithRelations {
    pub project: Project,
    pub owner: Option<User>,
    pub tasks: Vec<Task>,
    pub task_count: i64,
}

pub fn project_exists(conn: &mut PgConnection, id: Uuid) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(projects::table.find(id))).get_result(conn)
}

fn validate_fields(name: Option<&String>, description: Option<&String>) -> Result<(), ApiError> {
    if let Some(name) = name {
        validate_length("name", name, 1, 100)?;
    }
    if let Some(description) = description {
        validate_length("description", description, 0, 500)?;
    }
    Ok(())
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let mut conn = state.conn.get()?;

    let total: i64 = projects::table.count().get_result(&mut conn)?;
    let rows: Vec<Project> = projects::table
        .order((projects::created_at.asc(), projects::id.asc()))
        .offset(page.skip())
        .limit(page.limit())
        .load(&mut conn)?;

    Ok(Json(ProjectListResponse {
        projects: rows,
        total,
        skip: page.skip(),
        limit: page.limit(),
    }))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    validate_fields(Some(&req.name), req.description.as_ref())?;

    let mut conn = state.conn.get()?;

    if let Some(owner_id) = req.owner_id {
        if !user_exists(&mut conn, owner_id)? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
    }

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        name: req.name,
        description: req.description,
        is_active: req.is_active.unwrap_or(true),
        owner_id: req.owner_id,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(projects::table)
        .values(&project)
        .execute(&mut conn)?;

    info!("Created project {} ({})", project.name, project.id);
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectWithRelations>, ApiError> {
    let mut conn = state.conn.get()?;

    let project: Project = projects::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let owner: Option<User> = match project.owner_id {
        Some(owner_id) => users::table.find(owner_id).first(&mut conn).optional()?,
        None => None,
    };

    let project_tasks: Vec<Task> = tasks::table
        .filter(tasks::project_id.eq(id))
        .order((tasks::created_at.asc(), tasks::id.asc()))
        .load(&mut conn)?;

    let task_count = project_tasks.len() as i64;

    Ok(Json(ProjectWithRelations {
        project,
        owner,
        tasks: project_tasks,
        task_count,
    }))
}

pub async fn list_project_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let mut conn = state.conn.get()?;

    if !project_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    let rows: Vec<Task> = tasks::table
        .filter(tasks::project_id.eq(id))
        .order((tasks::created_at.asc(), tasks::id.asc()))
        .offset(page.skip())
        .limit(page.limit())
        .load(&mut conn)?;

    Ok(Json(rows))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    validate_fields(req.name.as_ref(), req.description.as_ref())?;

    let mut conn = state.conn.get()?;

    if !project_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }
    if let Some(owner_id) = req.owner_id {
        if !user_exists(&mut conn, owner_id)? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
    }

    let changes = ProjectChanges {
        name: req.name,
        description: req.description,
        is_active: req.is_active,
        owner_id: req.owner_id,
        updated_at: Some(Utc::now()),
    };

    diesel::update(projects::table.find(id))
        .set(&changes)
        .execute(&mut conn)?;

    let project: Project = projects::table.find(id).first(&mut conn)?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn.get()?;

    let deleted = diesel::delete(projects::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    info!("Deleted project {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_projects_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/tasks", get(list_project_tasks))
}
