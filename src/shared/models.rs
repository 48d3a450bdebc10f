pub mod schema {
    diesel::table! {
        users (id) {
            id -> Uuid,
            username -> Text,
            email -> Text,
            full_name -> Nullable<Text>,
            is_active -> Bool,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        projects (id) {
            id -> Uuid,
            name -> Text,
            description -> Nullable<Text>,
            is_active -> Bool,
            owner_id -> Nullable<Uuid>,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        tasks (id) {
            id -> Uuid,
            title -> Text,
            description -> Nullable<Text>,
            status -> Text,
            priority -> Text,
            project_id -> Nullable<Uuid>,
            assignee_id -> Nullable<Uuid>,
            parent_task_id -> Nullable<Uuid>,
            estimated_hours -> Nullable<Float8>,
            actual_hours -> Nullable<Float8>,
            due_date -> Nullable<Timestamptz>,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        tags (id) {
            id -> Uuid,
            name -> Text,
            color -> Text,
            created_at -> Timestamptz,
        }
    }

    diesel::table! {
        comments (id) {
            id -> Uuid,
            task_id -> Uuid,
            author_id -> Uuid,
            content -> Text,
            created_at -> Timestamptz,
            updated_at -> Timestamptz,
        }
    }

    diesel::table! {
        task_tags (task_id, tag_id) {
            task_id -> Uuid,
            tag_id -> Uuid,
        }
    }

    diesel::joinable!(projects -> users (owner_id));
    diesel::joinable!(tasks -> projects (project_id));
    diesel::joinable!(tasks -> users (assignee_id));
    diesel::joinable!(comments -> tasks (task_id));
    diesel::joinable!(comments -> users (author_id));
    diesel::joinable!(task_tags -> tasks (task_id));
    diesel::joinable!(task_tags -> tags (tag_id));

    diesel::allow_tables_to_appear_in_same_query!(
        users, projects, tasks, tags, comments, task_tags,
    );
}

pub use schema::*;
