// src/handlers/users.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, AppJson},
    models::user::{USER_COLUMNS, UpdateProfileRequest, User},
    utils::{html::clean_html, jwt::Claims},
};

pub(crate) async fn fetch_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Get the caller's own profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, claims.user_id()?).await?;
    Ok(Json(user.into_private()))
}

/// Public profile of any user.
pub async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, id).await?;
    Ok(Json(user.into_public()))
}

/// Update the caller's own profile. Rating and order counters are not
/// writable here; only the order engine changes them.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.validate()?;

    if payload.is_empty() {
        return Ok(Json(fetch_user(&pool, user_id).await?.into_private()));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(bio) = payload.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(clean_html(bio.trim()));
    }

    if let Some(skills) = payload.skills {
        let skills: Vec<String> = skills.into_iter().map(|s| s.trim().to_string()).collect();
        separated.push("skills = ");
        separated.push_bind_unseparated(skills);
    }

    if let Some(hourly_rate) = payload.hourly_rate {
        separated.push("hourly_rate = ");
        separated.push_bind_unseparated(hourly_rate);
    }

    if let Some(location) = payload.location {
        separated.push("location = ");
        separated.push_bind_unseparated(location.trim().to_string());
    }

    if let Some(avatar) = payload.avatar {
        separated.push("avatar = ");
        separated.push_bind_unseparated(avatar);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(user_id);
    builder.push(format!(" RETURNING {}", USER_COLUMNS));

    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update profile: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into_private()))
}
