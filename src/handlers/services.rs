// src/handlers/services.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, AppJson},
    handlers::users::fetch_user,
    models::{
        pagination::{PageMeta, Pagination},
        service::{
            CreateServiceRequest, SERVICE_SELECT, ServiceListParams, ServiceListResponse,
            ServiceResponse, ServiceRow, ServiceSort, UpdateServiceRequest, escape_like,
            normalize_tags,
        },
        user::Role,
    },
    utils::{html::clean_html, jwt::Claims},
};

pub(crate) async fn fetch_service(pool: &PgPool, id: i64) -> Result<ServiceRow, AppError> {
    sqlx::query_as::<_, ServiceRow>(&format!("{} WHERE s.id = $1", SERVICE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Service not found".to_string()))
}

/// Fetches the listing and checks the caller owns it.
async fn fetch_owned_service(pool: &PgPool, id: i64, user_id: i64) -> Result<ServiceRow, AppError> {
    let service = fetch_service(pool, id).await?;
    if service.owner_id != user_id {
        return Err(AppError::Forbidden(
            "Only the owner can modify this service".to_string(),
        ));
    }
    Ok(service)
}

/// Create a listing.
/// Requires: Login + freelancer role (checked against the stored record).
pub async fn create_service(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.validate()?;

    let owner = fetch_user(&pool, user_id).await?;
    if owner.role() != Role::Freelancer {
        return Err(AppError::Forbidden(
            "Only freelancers can create services".to_string(),
        ));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO services (owner_id, title, description, category, price, delivery_time, tags, image)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(payload.title.trim())
    .bind(clean_html(payload.description.trim()))
    .bind(payload.category.trim())
    .bind(payload.price)
    .bind(payload.delivery_time.trim())
    .bind(normalize_tags(payload.tags))
    .bind(payload.image)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create service: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(service_id = id, owner_id = user_id, "service created");

    let service = fetch_service(&pool, id).await?;
    Ok((StatusCode::CREATED, Json(ServiceResponse::from(service))))
}

/// Appends the search filters shared by the count and page queries.
fn push_service_filters(builder: &mut QueryBuilder<'_, Postgres>, params: &ServiceListParams) {
    builder.push(" WHERE s.is_active = TRUE");

    if let Some(category) = params.category.as_deref().filter(|c| !c.trim().is_empty()) {
        builder.push(" AND s.category = ");
        builder.push_bind(category.trim().to_string());
    }

    if let Some(q) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = format!("%{}%", escape_like(q.trim()));
        builder.push(" AND (s.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR s.description ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }

    if let Some(min_price) = params.min_price {
        builder.push(" AND s.price >= ");
        builder.push_bind(min_price);
    }

    if let Some(max_price) = params.max_price {
        builder.push(" AND s.price <= ");
        builder.push_bind(max_price);
    }

    if let Some(owner_id) = params.freelancer_id {
        builder.push(" AND s.owner_id = ");
        builder.push_bind(owner_id);
    }

    if let Some(tag) = params.tag.as_deref().filter(|t| !t.trim().is_empty()) {
        builder.push(" AND ");
        builder.push_bind(tag.trim().to_lowercase());
        builder.push(" = ANY(s.tags)");
    }
}

/// Search active listings with filters and page/limit pagination.
pub async fn list_services(
    State(pool): State<PgPool>,
    Query(params): Query<ServiceListParams>,
) -> Result<impl IntoResponse, AppError> {
    let sort = ServiceSort::parse(params.sort.as_deref())?;
    let pagination = Pagination::new(params.page, params.limit);

    let mut count_query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM services s");
    push_service_filters(&mut count_query, &params);
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    let mut page_query: QueryBuilder<Postgres> = QueryBuilder::new(SERVICE_SELECT);
    push_service_filters(&mut page_query, &params);
    page_query.push(sort.order_by());
    page_query.push(" LIMIT ");
    page_query.push_bind(pagination.limit);
    page_query.push(" OFFSET ");
    page_query.push_bind(pagination.offset());

    let rows = page_query
        .build_query_as::<ServiceRow>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list services: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(ServiceListResponse {
        services: rows.into_iter().map(ServiceResponse::from).collect(),
        meta: PageMeta::new(total, pagination),
    }))
}

/// Get a single listing by ID.
pub async fn get_service(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let service = fetch_service(&pool, id).await?;
    Ok(Json(ServiceResponse::from(service)))
}

/// Partial update of a listing. Owner only.
/// Existing orders keep their snapshotted title and price.
pub async fn update_service(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.validate()?;

    fetch_owned_service(&pool, id, user_id).await?;

    if payload.is_empty() {
        return Ok(Json(ServiceResponse::from(fetch_service(&pool, id).await?)));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE services SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(description.trim()));
    }

    if let Some(category) = payload.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category.trim().to_string());
    }

    if let Some(price) = payload.price {
        separated.push("price = ");
        separated.push_bind_unseparated(price);
    }

    if let Some(delivery_time) = payload.delivery_time {
        separated.push("delivery_time = ");
        separated.push_bind_unseparated(delivery_time.trim().to_string());
    }

    if let Some(tags) = payload.tags {
        separated.push("tags = ");
        separated.push_bind_unseparated(normalize_tags(tags));
    }

    if let Some(image) = payload.image {
        separated.push("image = ");
        separated.push_bind_unseparated(image);
    }

    if let Some(is_active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(is_active);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update service: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(ServiceResponse::from(fetch_service(&pool, id).await?)))
}

/// Remove a listing. Owner only.
/// Listings with order history are deactivated instead of deleted so past
/// orders keep their reference.
pub async fn delete_service(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user_id = claims.user_id()?;
    fetch_owned_service(&pool, id, user_id).await?;

    let mut tx = pool.begin().await?;

    // Holding the row lock keeps a concurrent order insert (FK share lock) out.
    sqlx::query("SELECT id FROM services WHERE id = $1 FOR UPDATE")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let has_orders: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE service_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    if has_orders {
        sqlx::query("UPDATE services SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(service_id = id, "service with order history deactivated");
        return Ok(Json(serde_json::json!({ "id": id, "deactivated": true })).into_response());
    }

    sqlx::query("DELETE FROM services WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete service: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
