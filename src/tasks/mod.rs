pub mod types;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::comments::Comment;
use crate::projects::{project_exists, Project};
use crate::shared::error::ApiError;
use crate::shared::models::schema::{comments, projects, tags, task_tags, tasks, users};
use crate::shared::state::AppState;
use crate::shared::utils::{validate_length, validate_non_negative, PageParams};
use crate::tags::Tag;
use crate::users::{user_exists, User};

pub use types::{TaskPriority, TaskStatus};
use types::*;

#[derive(Debug, Clone, Copy, Queryable, Insertable)]
#[diesel(table_name = task_tags)]
pub struct TaskTagLink {
    pub task_id: Uuid,
    pub tag_id: Uuid,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tasks)]
struct TaskChanges {
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    project_id: Option<Uuid>,
    assignee_id: Option<Uuid>,
    parent_task_id: Option<Uuid>,
    estimated_hours: Option<f64>,
    actual_hours: Option<f64>,
    due_date: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

pub fn task_exists(conn: &mut PgConnection, id: Uuid) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(tasks::table.find(id))).get_result(conn)
}

fn ensure_tags_exist(conn: &mut PgConnection, ids: &[Uuid]) -> Result<(), ApiError> {
    let unique: BTreeSet<Uuid> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }
    let found: i64 = tags::table
        .filter(tags::id.eq_any(unique.iter().copied().collect::<Vec<_>>()))
        .count()
        .get_result(conn)?;
    if found as usize != unique.len() {
        return Err(ApiError::NotFound("Tag not found".to_string()));
    }
    Ok(())
}

/// True when setting `new_parent` as the parent of `task_id` would make the
/// task its own ancestor. The walk is bounded by the map size, so a
/// pre-existing loop in the data cannot hang it.
fn creates_cycle(
    task_id: Uuid,
    new_parent: Uuid,
    parent_of: &HashMap<Uuid, Option<Uuid>>,
) -> bool {
    if new_parent == task_id {
        return true;
    }
    let mut current = Some(new_parent);
    let mut hops = 0usize;
    while let Some(id) = current {
        if id == task_id {
            return true;
        }
        hops += 1;
        if hops > parent_of.len() {
            return true;
        }
        current = parent_of.get(&id).copied().flatten();
    }
    false
}

fn load_parent_map(conn: &mut PgConnection) -> QueryResult<HashMap<Uuid, Option<Uuid>>> {
    let pairs: Vec<(Uuid, Option<Uuid>)> = tasks::table
        .select((tasks::id, tasks::parent_task_id))
        .load(conn)?;
    Ok(pairs.into_iter().collect())
}

#[derive(Debug, Default)]
struct ParsedFilters {
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    project_id: Option<Uuid>,
    assignee_id: Option<Uuid>,
    tag_ids: Option<Vec<Uuid>>,
    due_before: Option<DateTime<Utc>>,
    due_after: Option<DateTime<Utc>>,
}

fn parse_filters(query: &TaskFilterQuery) -> Result<ParsedFilters, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(TaskStatus::from_str)
        .transpose()
        .map_err(ApiError::Validation)?;
    let priority = query
        .priority
        .as_deref()
        .map(TaskPriority::from_str)
        .transpose()
        .map_err(ApiError::Validation)?;

    let tag_ids = query
        .tag_ids
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Uuid::parse_str(s)
                        .map_err(|_| ApiError::Validation(format!("invalid tag id: {s}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        // an empty parameter is no constraint, not a match-nothing filter
        .filter(|ids| !ids.is_empty());

    let parse_date = |field: &str, value: Option<&str>| -> Result<Option<DateTime<Utc>>, ApiError> {
        value
            .map(|v| {
                DateTime::parse_from_rfc3339(v)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|_| {
                        ApiError::Validation(format!("{field} must be an RFC 3339 timestamp"))
                    })
            })
            .transpose()
    };

    Ok(ParsedFilters {
        status,
        priority,
        project_id: query.project_id,
        assignee_id: query.assignee_id,
        tag_ids,
        due_before: parse_date("due_before", query.due_before.as_deref())?,
        due_after: parse_date("due_after", query.due_after.as_deref())?,
    })
}

fn build_filter_query(filters: &ParsedFilters) -> tasks::BoxedQuery<'static, diesel::pg::Pg> {
    let mut q = tasks::table.into_boxed();

    if let Some(status) = filters.status {
        q = q.filter(tasks::status.eq(status.as_str()));
    }
    if let Some(priority) = filters.priority {
        q = q.filter(tasks::priority.eq(priority.as_str()));
    }
    if let Some(project_id) = filters.project_id {
        q = q.filter(tasks::project_id.eq(project_id));
    }
    if let Some(assignee_id) = filters.assignee_id {
        q = q.filter(tasks::assignee_id.eq(assignee_id));
    }
    if let Some(tag_ids) = &filters.tag_ids {
        let member_of = task_tags::table
            .filter(task_tags::tag_id.eq_any(tag_ids.clone()))
            .select(task_tags::task_id);
        q = q.filter(tasks::id.eq_any(member_of));
    }
    if let Some(due_before) = filters.due_before {
        q = q.filter(tasks::due_date.lt(due_before));
    }
    if let Some(due_after) = filters.due_after {
        q = q.filter(tasks::due_date.gt(due_after));
    }
    q
}

fn validate_task_fields(
    title: Option<&String>,
    description: Option<&String>,
    estimated_hours: Option<f64>,
    actual_hours: Option<f64>,
) -> Result<(), ApiError> {
    if let Some(title) = title {
        validate_length("title", title, 1, 200)?;
    }
    if let Some(description) = description {
        validate_length("description", description, 0, 1000)?;
    }
    validate_non_negative("estimated_hours", estimated_hours)?;
    validate_non_negative("actual_hours", actual_hours)?;
    Ok(())
}

fn replace_task_tags(
    conn: &mut PgConnection,
    task_id: Uuid,
    tag_ids: &[Uuid],
) -> Result<(), ApiError> {
    ensure_tags_exist(conn, tag_ids)?;
    diesel::delete(task_tags::table.filter(task_tags::task_id.eq(task_id))).execute(conn)?;
    let links: Vec<TaskTagLink> = tag_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|tag_id| TaskTagLink { task_id, tag_id })
        .collect();
    if !links.is_empty() {
        diesel::insert_into(task_tags::table)
            .values(&links)
            .execute(conn)?;
    }
    Ok(())
}

/// Deterministic list order: creation time, then id as a tiebreaker.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskFilterQuery>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let filters = parse_filters(&query)?;
    let page = PageParams {
        skip: query.skip,
        limit: query.limit,
    };

    let mut conn = state.conn.get()?;

    let total: i64 = build_filter_query(&filters).count().get_result(&mut conn)?;
    let rows: Vec<Task> = build_filter_query(&filters)
        .order((tasks::created_at.asc(), tasks::id.asc()))
        .offset(page.skip())
        .limit(page.limit())
        .load(&mut conn)?;

    Ok(Json(TaskListResponse {
        tasks: rows,
        total,
        skip: page.skip(),
        limit: page.limit(),
    }))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskWithRelations>, ApiError> {
    let mut conn = state.conn.get()?;

    let task: Task = tasks::table
        .find(id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    let project: Option<Project> = match task.project_id {
        Some(project_id) => projects::table.find(project_id).first(&mut conn).optional()?,
        None => None,
    };
    let assignee: Option<User> = match task.assignee_id {
        Some(assignee_id) => users::table.find(assignee_id).first(&mut conn).optional()?,
        None => None,
    };
    let parent_task: Option<Task> = match task.parent_task_id {
        Some(parent_id) => tasks::table.find(parent_id).first(&mut conn).optional()?,
        None => None,
    };

    let subtasks: Vec<Task> = tasks::table
        .filter(tasks::parent_task_id.eq(id))
        .order((tasks::created_at.asc(), tasks::id.asc()))
        .load(&mut conn)?;

    let task_tag_ids = task_tags::table
        .filter(task_tags::task_id.eq(id))
        .select(task_tags::tag_id);
    let task_tags_list: Vec<Tag> = tags::table
        .filter(tags::id.eq_any(task_tag_ids))
        .order(tags::name.asc())
        .load(&mut conn)?;

    let task_comments: Vec<Comment> = comments::table
        .filter(comments::task_id.eq(id))
        .order(comments::created_at.asc())
        .load(&mut conn)?;

    let subtask_count = subtasks.len() as i64;
    let comment_count = task_comments.len() as i64;

    Ok(Json(TaskWithRelations {
        task,
        project,
        assignee,
        parent_task,
        subtasks,
        tags: task_tags_list,
        comments: task_comments,
        subtask_count,
        comment_count,
    }))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    validate_task_fields(
        Some(&req.title),
        req.description.as_ref(),
        req.estimated_hours,
        req.actual_hours,
    )?;

    let mut conn = state.conn.get()?;

    let task = conn.transaction::<Task, ApiError, _>(|conn| {
        if let Some(project_id) = req.project_id {
            if !project_exists(conn, project_id)? {
                return Err(ApiError::NotFound("Project not found".to_string()));
            }
        }
        if let Some(assignee_id) = req.assignee_id {
            if !user_exists(conn, assignee_id)? {
                return Err(ApiError::NotFound("User not found".to_string()));
            }
        }
        if let Some(parent_id) = req.parent_task_id {
            if !task_exists(conn, parent_id)? {
                return Err(ApiError::NotFound("Parent task not found".to_string()));
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: req.title.clone(),
            description: req.description.clone(),
            status: req.status.unwrap_or(TaskStatus::Pending).as_str().to_string(),
            priority: req
                .priority
                .unwrap_or(TaskPriority::Medium)
                .as_str()
                .to_string(),
            project_id: req.project_id,
            assignee_id: req.assignee_id,
            parent_task_id: req.parent_task_id,
            estimated_hours: req.estimated_hours,
            actual_hours: req.actual_hours,
            due_date: req.due_date,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(tasks::table)
            .values(&task)
            .execute(conn)?;

        if let Some(tag_ids) = &req.tag_ids {
            replace_task_tags(conn, task.id, tag_ids)?;
        }

        Ok(task)
    })?;

    info!("Created task {} ({})", task.title, task.id);
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    validate_task_fields(
        req.title.as_ref(),
        req.description.as_ref(),
        req.estimated_hours,
        req.actual_hours,
    )?;

    let mut conn = state.conn.get()?;

    let task = conn.transaction::<Task, ApiError, _>(|conn| {
        if !task_exists(conn, id)? {
            return Err(ApiError::NotFound("Task not found".to_string()));
        }
        if let Some(project_id) = req.project_id {
            if !project_exists(conn, project_id)? {
                return Err(ApiError::NotFound("Project not found".to_string()));
            }
        }
        if let Some(assignee_id) = req.assignee_id {
            if !user_exists(conn, assignee_id)? {
                return Err(ApiError::NotFound("User not found".to_string()));
            }
        }
        if let Some(parent_id) = req.parent_task_id {
            if !task_exists(conn, parent_id)? {
                return Err(ApiError::NotFound("Parent task not found".to_string()));
            }
            let parent_of = load_parent_map(conn)?;
            if creates_cycle(id, parent_id, &parent_of) {
                return Err(ApiError::Conflict(
                    "parent_task_id would make the task its own ancestor".to_string(),
                ));
            }
        }

        let changes = TaskChanges {
            title: req.title.clone(),
            description: req.description.clone(),
            status: req.status.map(|s| s.as_str().to_string()),
            priority: req.priority.map(|p| p.as_str().to_string()),
            project_id: req.project_id,
            assignee_id: req.assignee_id,
            parent_task_id: req.parent_task_id,
            estimated_hours: req.estimated_hours,
            actual_hours: req.actual_hours,
            due_date: req.due_date,
            updated_at: Some(Utc::now()),
        };

        diesel::update(tasks::table.find(id))
            .set(&changes)
            .execute(conn)?;

        if let Some(tag_ids) = &req.tag_ids {
            replace_task_tags(conn, id, tag_ids)?;
        }

        let task: Task = tasks::table.find(id).first(conn)?;
        Ok(task)
    })?;

    Ok(Json(task))
}

/// Comments and tag links cascade at the database level; subtasks are
/// promoted to top level by the `ON DELETE SET NULL` parent reference.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn.get()?;

    let deleted = diesel::delete(tasks::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    info!("Deleted task {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_subtasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let mut conn = state.conn.get()?;

    if !task_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let subtasks: Vec<Task> = tasks::table
        .filter(tasks::parent_task_id.eq(id))
        .order((tasks::created_at.asc(), tasks::id.asc()))
        .load(&mut conn)?;

    Ok(Json(subtasks))
}

pub async fn list_task_comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let mut conn = state.conn.get()?;

    if !task_exists(&mut conn, id)? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let task_comments: Vec<Comment> = comments::table
        .filter(comments::task_id.eq(id))
        .order(comments::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(task_comments))
}

/// Each task id is updated in its own transaction; one failing id never
/// rolls back the others. The response preserves input order.
pub async fn bulk_update_tasks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<BulkUpdateResponse>, ApiError> {
    let mut conn = state.conn.get()?;

    if let Some(assignee_id) = req.assignee_id {
        if !user_exists(&mut conn, assignee_id)? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
    }
    if let Some(add_tag_ids) = &req.add_tag_ids {
        ensure_tags_exist(&mut conn, add_tag_ids)?;
    }

    let mut results = Vec::with_capacity(req.task_ids.len());
    for &task_id in &req.task_ids {
        let outcome = conn.transaction::<(), ApiError, _>(|conn| {
            if !task_exists(conn, task_id)? {
                return Err(ApiError::NotFound("Task not found".to_string()));
            }

            let changes = TaskChanges {
                status: req.status.map(|s| s.as_str().to_string()),
                priority: req.priority.map(|p| p.as_str().to_string()),
                assignee_id: req.assignee_id,
                updated_at: Some(Utc::now()),
                ..TaskChanges::default()
            };
            diesel::update(tasks::table.find(task_id))
                .set(&changes)
                .execute(conn)?;

            if let Some(add_tag_ids) = &req.add_tag_ids {
                let links: Vec<TaskTagLink> = add_tag_ids
                    .iter()
                    .copied()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(|tag_id| TaskTagLink { task_id, tag_id })
                    .collect();
                if !links.is_empty() {
                    diesel::insert_into(task_tags::table)
                        .values(&links)
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                }
            }
            if let Some(remove_tag_ids) = &req.remove_tag_ids {
                diesel::delete(
                    task_tags::table
                        .filter(task_tags::task_id.eq(task_id))
                        .filter(task_tags::tag_id.eq_any(remove_tag_ids.clone())),
                )
                .execute(conn)?;
            }
            Ok(())
        });

        results.push(match outcome {
            Ok(()) => BulkUpdateOutcome {
                task_id,
                updated: true,
                error: None,
            },
            Err(e) => BulkUpdateOutcome {
                task_id,
                updated: false,
                error: Some(e.to_string()),
            },
        });
    }

    Ok(Json(BulkUpdateResponse { results }))
}

pub async fn get_task_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskStats>, ApiError> {
    let mut conn = state.conn.get()?;

    let total_tasks: i64 = tasks::table.count().get_result(&mut conn)?;

    let mut by_status = [0i64; 4];
    for (i, status) in TaskStatus::ALL.iter().enumerate() {
        by_status[i] = tasks::table
            .filter(tasks::status.eq(status.as_str()))
            .count()
            .get_result(&mut conn)?;
    }
    let mut by_priority = [0i64; 4];
    for (i, priority) in TaskPriority::ALL.iter().enumerate() {
        by_priority[i] = tasks::table
            .filter(tasks::priority.eq(priority.as_str()))
            .count()
            .get_result(&mut conn)?;
    }

    let stats = TaskStats {
        total_tasks,
        pending_tasks: by_status[0],
        in_progress_tasks: by_status[1],
        completed_tasks: by_status[2],
        cancelled_tasks: by_status[3],
        low_priority_tasks: by_priority[0],
        medium_priority_tasks: by_priority[1],
        high_priority_tasks: by_priority[2],
        urgent_priority_tasks: by_priority[3],
        completion_rate: types::completion_rate(by_status[2], total_tasks),
    };

    Ok(Json(stats))
}

pub fn configure_tasks_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/", get(list_tasks).post(create_task))
        .route("/tasks/stats/summary", get(get_task_stats))
        .route("/tasks/bulk", post(bulk_update_tasks))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/subtasks", get(list_subtasks))
        .route("/tasks/:id/comments", get(list_task_comments))
}
