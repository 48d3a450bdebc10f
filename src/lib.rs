pub mod api_router;
pub mod bootstrap;
pub mod comments;
pub mod config;
pub mod projects;
pub mod shared;
pub mod tags;
pub mod tasks;
pub mod users;
