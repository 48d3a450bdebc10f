//! End-to-end API tests against a live Postgres instance.
//! Each test skips when DATABASE_URL is not set.
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use taskboard::api_router::configure_api_routes;
use taskboard::bootstrap;
use taskboard::config::AppConfig;
use taskboard::shared::state::AppState;
use taskboard::shared::utils::create_conn;

async fn spawn_app() -> Option<String> {
    dotenvy::dotenv().ok();
    if std::env::var("DATABASE_URL").is_err() {
        println!("Skipping test - DATABASE_URL not set");
        return None;
    }

    let config = AppConfig::from_env().ok()?;
    let pool = create_conn(&config.database_url()).ok()?;

    // tests share one process; run migrations and seed exactly once
    static DB_INIT: OnceLock<bool> = OnceLock::new();
    if !*DB_INIT.get_or_init(|| bootstrap::initialize(&pool).is_ok()) {
        return None;
    }

    let state = Arc::new(AppState { conn: pool, config });
    let app = configure_api_routes().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.ok()?;
    let addr = listener.local_addr().ok()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Some(format!("http://{addr}"))
}

async fn create_user(client: &reqwest::Client, base: &str) -> Uuid {
    let suffix = Uuid::new_v4().simple().to_string();
    let resp = client
        .post(format!("{base}/users"))
        .json(&json!({
            "username": format!("user_{}", &suffix[..8]),
            "email": format!("{}@example.com", &suffix[..8]),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn create_task(client: &reqwest::Client, base: &str, body: Value) -> (u16, Value) {
    let resp = client
        .post(format!("{base}/tasks"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn task_crud_hierarchy_and_cascade() {
    let Some(base) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let user_id = create_user(&client, &base).await;

    let resp = client
        .post(format!("{base}/projects"))
        .json(&json!({ "name": "Integration project", "owner_id": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let project: Value = resp.json().await.unwrap();
    let project_id = project["id"].as_str().unwrap();

    let resp = client
        .post(format!("{base}/tags"))
        .json(&json!({ "name": "integration", "color": "#00ff00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let tag: Value = resp.json().await.unwrap();
    let tag_id = tag["id"].as_str().unwrap();

    let (status, parent) = create_task(
        &client,
        &base,
        json!({
            "title": "Parent task",
            "priority": "high",
            "project_id": project_id,
            "assignee_id": user_id,
            "tag_ids": [tag_id],
        }),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(parent["status"], "pending");
    let parent_id = parent["id"].as_str().unwrap().to_string();

    let (status, child) = create_task(
        &client,
        &base,
        json!({ "title": "Child task", "parent_task_id": parent_id }),
    )
    .await;
    assert_eq!(status, 201);
    let child_id = child["id"].as_str().unwrap().to_string();

    // expanded read carries relations and derived counts
    let resp = client
        .get(format!("{base}/tasks/{parent_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let expanded: Value = resp.json().await.unwrap();
    assert_eq!(expanded["task"]["id"].as_str().unwrap(), parent_id);
    assert!(expanded["subtask_count"].as_i64().unwrap() >= 1);
    assert_eq!(expanded["tags"][0]["name"], "integration");
    assert_eq!(expanded["project"]["name"], "Integration project");

    let resp = client
        .get(format!("{base}/tasks/{parent_id}/subtasks"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let subtasks: Value = resp.json().await.unwrap();
    assert!(subtasks
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["id"].as_str() == Some(child_id.as_str())));

    // cyclic re-parenting is rejected
    let resp = client
        .put(format!("{base}/tasks/{parent_id}"))
        .json(&json!({ "parent_task_id": parent_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .put(format!("{base}/tasks/{parent_id}"))
        .json(&json!({ "parent_task_id": child_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // partial update leaves other fields alone
    let resp = client
        .put(format!("{base}/tasks/{child_id}"))
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["title"], "Child task");

    // filtering: only completed tasks come back, limit is clamped
    let resp = client
        .get(format!(
            "{base}/tasks?status=completed&assignee_id={user_id}&limit=1000"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed["limit"].as_i64().unwrap(), 100);
    assert!(listed["tasks"].as_array().unwrap().len() <= 100);
    for task in listed["tasks"].as_array().unwrap() {
        assert_eq!(task["status"], "completed");
    }

    // deleting the parent cascades comments and promotes the child
    let resp = client
        .post(format!("{base}/comments"))
        .json(&json!({
            "task_id": parent_id,
            "author_id": user_id,
            "content": "will be cascaded",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let comment: Value = resp.json().await.unwrap();
    let comment_id = comment["id"].as_str().unwrap();

    let resp = client
        .delete(format!("{base}/tasks/{parent_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{base}/tasks/{parent_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{base}/comments/{comment_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{base}/tasks/{child_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let orphan: Value = resp.json().await.unwrap();
    assert!(orphan["task"]["parent_task_id"].is_null());
}

#[tokio::test]
async fn validation_and_missing_references() {
    let Some(base) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    // unknown enum value is rejected at deserialization
    let (status, _) = create_task(
        &client,
        &base,
        json!({ "title": "Bad status", "status": "done" }),
    )
    .await;
    assert_eq!(status, 422);

    let (status, _) = create_task(&client, &base, json!({ "title": "" })).await;
    assert_eq!(status, 422);

    let (status, _) = create_task(
        &client,
        &base,
        json!({ "title": "Negative", "estimated_hours": -1.0 }),
    )
    .await;
    assert_eq!(status, 422);

    let (status, _) = create_task(
        &client,
        &base,
        json!({ "title": "Ghost project", "project_id": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(status, 404);

    let resp = client
        .post(format!("{base}/tags"))
        .json(&json!({ "name": "badcolor", "color": "green" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = client
        .get(format!("{base}/tasks/{}", Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // bad filter value is a validation error, empty result is not
    let resp = client
        .get(format!("{base}/tasks?status=nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = client
        .get(format!(
            "{base}/tasks?status=cancelled&assignee_id={}",
            Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed["tasks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn tag_filters_due_windows_and_bulk_tag_links() {
    let Some(base) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let mut tag_ids = Vec::new();
    for color in ["#111111", "#222222"] {
        let resp = client
            .post(format!("{base}/tags"))
            .json(&json!({ "name": format!("filter-{}", &color[1..]), "color": color }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let tag: Value = resp.json().await.unwrap();
        tag_ids.push(tag["id"].as_str().unwrap().to_string());
    }
    let (tag_a, tag_b) = (&tag_ids[0], &tag_ids[1]);

    let (status, early) = create_task(
        &client,
        &base,
        json!({
            "title": "Due in January",
            "tag_ids": [tag_a],
            "due_date": "2030-01-10T00:00:00Z",
        }),
    )
    .await;
    assert_eq!(status, 201);
    let early_id = early["id"].as_str().unwrap().to_string();

    let (status, late) = create_task(
        &client,
        &base,
        json!({
            "title": "Due in March",
            "tag_ids": [tag_a],
            "due_date": "2030-03-10T00:00:00Z",
        }),
    )
    .await;
    assert_eq!(status, 201);
    let late_id = late["id"].as_str().unwrap().to_string();

    let (status, untagged) = create_task(
        &client,
        &base,
        json!({ "title": "Tagged differently", "tag_ids": [tag_b] }),
    )
    .await;
    assert_eq!(status, 201);
    let untagged_id = untagged["id"].as_str().unwrap().to_string();

    // membership on a single tag
    let resp = client
        .get(format!("{base}/tasks?tag_ids={tag_a}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed["total"].as_i64().unwrap(), 2);
    let ids: Vec<&str> = listed["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&early_id.as_str()));
    assert!(ids.contains(&late_id.as_str()));
    assert!(!ids.contains(&untagged_id.as_str()));

    // membership on any of several tags
    let resp = client
        .get(format!("{base}/tasks?tag_ids={tag_a},{tag_b}"))
        .send()
        .await
        .unwrap();
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed["total"].as_i64().unwrap(), 3);

    // due-date window narrows the tagged set
    let resp = client
        .get(format!(
            "{base}/tasks?tag_ids={tag_a}&due_after=2030-01-01T00:00:00Z&due_before=2030-02-01T00:00:00Z"
        ))
        .send()
        .await
        .unwrap();
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed["total"].as_i64().unwrap(), 1);
    assert_eq!(listed["tasks"][0]["id"].as_str().unwrap(), early_id);

    let resp = client
        .get(format!(
            "{base}/tasks?tag_ids={tag_a}&due_before=2030-01-01T00:00:00Z"
        ))
        .send()
        .await
        .unwrap();
    let listed: Value = resp.json().await.unwrap();
    assert_eq!(listed["total"].as_i64().unwrap(), 0);

    // bulk add/remove rewires the link rows; re-adding is idempotent
    let resp = client
        .post(format!("{base}/tasks/bulk"))
        .json(&json!({
            "task_ids": [untagged_id, early_id],
            "add_tag_ids": [tag_a],
            "remove_tag_ids": [tag_b],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    for result in body["results"].as_array().unwrap() {
        assert_eq!(result["updated"], true);
    }

    let resp = client
        .get(format!("{base}/tasks/{untagged_id}"))
        .send()
        .await
        .unwrap();
    let expanded: Value = resp.json().await.unwrap();
    let tags: Vec<&str> = expanded["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec![tag_a.as_str()]);

    let resp = client
        .get(format!("{base}/tasks/{early_id}"))
        .send()
        .await
        .unwrap();
    let expanded: Value = resp.json().await.unwrap();
    assert_eq!(expanded["tags"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bulk_update_and_stats() {
    let Some(base) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for i in 0..3 {
        let (status, task) =
            create_task(&client, &base, json!({ "title": format!("Bulk {i}") })).await;
        assert_eq!(status, 201);
        ids.push(task["id"].as_str().unwrap().to_string());
    }
    let ghost = Uuid::new_v4().to_string();

    let resp = client
        .post(format!("{base}/tasks/bulk"))
        .json(&json!({
            "task_ids": [ids[0], ids[1], ids[2], ghost],
            "status": "completed",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    for result in &results[..3] {
        assert_eq!(result["updated"], true);
    }
    assert_eq!(results[3]["updated"], false);
    assert!(results[3]["error"].as_str().unwrap().contains("not found"));

    for id in &ids {
        let resp = client.get(format!("{base}/tasks/{id}")).send().await.unwrap();
        let task: Value = resp.json().await.unwrap();
        assert_eq!(task["task"]["status"], "completed");
    }

    let resp = client
        .get(format!("{base}/tasks/stats/summary"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let stats: Value = resp.json().await.unwrap();
    let total = stats["total_tasks"].as_i64().unwrap();
    let completed = stats["completed_tasks"].as_i64().unwrap();
    assert!(total >= completed);
    assert!(completed >= 3);
    let rate = stats["completion_rate"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&rate));
    if total > 0 {
        let expected = (completed as f64 / total as f64 * 100.0).round() / 100.0;
        assert!((rate - expected).abs() < 1e-9);
    }
}
