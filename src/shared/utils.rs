use crate::shared::error::ApiError;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::PgConnection;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().build(manager)
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// skip/limit query parameters shared by every list endpoint.
/// Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").unwrap());
static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), ApiError> {
    if !EMAIL_RE.is_match(value) {
        return Err(ApiError::Validation(format!(
            "invalid email address: {value}"
        )));
    }
    Ok(())
}

pub fn validate_hex_color(value: &str) -> Result<(), ApiError> {
    if !HEX_COLOR_RE.is_match(value) {
        return Err(ApiError::Validation(format!(
            "color must be a hex string like #3498db, got {value}"
        )));
    }
    Ok(())
}

pub fn validate_non_negative(field: &str, value: Option<f64>) -> Result<(), ApiError> {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            return Err(ApiError::Validation(format!(
                "{field} must be non-negative"
            )));
        }
    }
    Ok(())
}
