//! Request extractors.

use axum::{
    extract::{FromRequestParts, Multipart},
    http::request::Parts,
};
use gifted_common::{AppError, AppResult};
use gifted_db::entities::user;
use serde::Deserialize;

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// `?limit=&until_id=` cursor pagination.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Read the bytes of the first file part named one of `field_names`.
pub async fn read_upload(
    mut multipart: Multipart,
    field_names: &[&str],
    max_bytes: usize,
) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if !field_names.contains(&name.as_str()) {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if data.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "Uploaded file exceeds the {max_bytes} byte limit"
            )));
        }

        return Ok(data.to_vec());
    }

    Err(AppError::Validation(format!(
        "Missing file field `{}`",
        field_names.first().copied().unwrap_or("file")
    )))
}
