//! Startup initialization: embedded migrations plus an idempotent demo
//! seed, invoked explicitly from `main` rather than as an import side
//! effect.
use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use uuid::Uuid;

use crate::comments::Comment;
use crate::projects::Project;
use crate::shared::models::schema::{comments, projects, tags, task_tags, tasks, users};
use crate::shared::utils::DbPool;
use crate::tags::Tag;
use crate::tasks::types::{Task, TaskPriority, TaskStatus};
use crate::tasks::TaskTagLink;
use crate::users::User;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration error: {e}"))?;
    Ok(())
}

pub fn initialize(pool: &DbPool) -> Result<()> {
    run_migrations(pool)?;
    seed_demo_data(pool)
}

/// Seeds the demo data set (2 users, 2 projects, 3 tasks, 4 tags, links,
/// 2 comments). No-op when any user already exists, so restarts never
/// duplicate rows.
pub fn seed_demo_data(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;

    let existing: i64 = users::table.count().get_result(&mut conn)?;
    if existing > 0 {
        info!("Seed skipped, {existing} users already present");
        return Ok(());
    }

    conn.transaction::<_, anyhow::Error, _>(|conn| {
        let now = Utc::now();

        let john = User {
            id: Uuid::new_v4(),
            username: "john_doe".to_string(),
            email: "john@example.com".to_string(),
            full_name: Some("John Doe".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let jane = User {
            id: Uuid::new_v4(),
            username: "jane_smith".to_string(),
            email: "jane@example.com".to_string(),
            full_name: Some("Jane Smith".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(users::table)
            .values(vec![&john, &jane])
            .execute(conn)?;

        let web_app = Project {
            id: Uuid::new_v4(),
            name: "Web Application".to_string(),
            description: Some("Building a modern web application".to_string()),
            is_active: true,
            owner_id: Some(john.id),
            created_at: now,
            updated_at: now,
        };
        let mobile_app = Project {
            id: Uuid::new_v4(),
            name: "Mobile App".to_string(),
            description: Some("Creating a mobile application".to_string()),
            is_active: true,
            owner_id: Some(jane.id),
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(projects::table)
            .values(vec![&web_app, &mobile_app])
            .execute(conn)?;

        let seed_tags: Vec<Tag> = [
            ("Frontend", "#3498db"),
            ("Backend", "#e74c3c"),
            ("Database", "#2ecc71"),
            ("Bug Fix", "#f39c12"),
        ]
        .into_iter()
        .map(|(name, color)| Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: color.to_string(),
            created_at: now,
        })
        .collect();
        diesel::insert_into(tags::table)
            .values(&seed_tags)
            .execute(conn)?;

        let auth_task = Task {
            id: Uuid::new_v4(),
            title: "Create user authentication".to_string(),
            description: Some("Implement JWT authentication for the application".to_string()),
            status: TaskStatus::InProgress.as_str().to_string(),
            priority: TaskPriority::High.as_str().to_string(),
            project_id: Some(web_app.id),
            assignee_id: Some(john.id),
            parent_task_id: None,
            estimated_hours: Some(8.0),
            actual_hours: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let schema_task = Task {
            id: Uuid::new_v4(),
            title: "Design database schema".to_string(),
            description: Some("Create the database schema for the application".to_string()),
            status: TaskStatus::Completed.as_str().to_string(),
            priority: TaskPriority::Medium.as_str().to_string(),
            project_id: Some(web_app.id),
            assignee_id: Some(jane.id),
            parent_task_id: None,
            estimated_hours: Some(4.0),
            actual_hours: Some(3.5),
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let components_task = Task {
            id: Uuid::new_v4(),
            title: "Build React components".to_string(),
            description: Some("Create reusable React components for the UI".to_string()),
            status: TaskStatus::Pending.as_str().to_string(),
            priority: TaskPriority::Medium.as_str().to_string(),
            project_id: Some(web_app.id),
            assignee_id: Some(john.id),
            parent_task_id: Some(auth_task.id),
            estimated_hours: Some(12.0),
            actual_hours: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(tasks::table)
            .values(vec![&auth_task, &schema_task, &components_task])
            .execute(conn)?;

        let links = vec![
            TaskTagLink {
                task_id: auth_task.id,
                tag_id: seed_tags[1].id,
            },
            TaskTagLink {
                task_id: auth_task.id,
                tag_id: seed_tags[2].id,
            },
            TaskTagLink {
                task_id: schema_task.id,
                tag_id: seed_tags[2].id,
            },
            TaskTagLink {
                task_id: components_task.id,
                tag_id: seed_tags[0].id,
            },
        ];
        diesel::insert_into(task_tags::table)
            .values(&links)
            .execute(conn)?;

        let seed_comments = vec![
            Comment {
                id: Uuid::new_v4(),
                task_id: auth_task.id,
                author_id: jane.id,
                content: "Great progress on this task!".to_string(),
                created_at: now,
                updated_at: now,
            },
            Comment {
                id: Uuid::new_v4(),
                task_id: schema_task.id,
                author_id: john.id,
                content: "Schema looks good, ready for implementation".to_string(),
                created_at: now,
                updated_at: now,
            },
        ];
        diesel::insert_into(comments::table)
            .values(&seed_comments)
            .execute(conn)?;

        Ok(())
    })?;

    info!("Database seeded with demo data");
    Ok(())
}
