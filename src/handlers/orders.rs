// src/handlers/orders.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use validator::Validate;

use crate::{
    error::{AppError, AppJson},
    handlers::{services::fetch_service, users::fetch_user},
    models::{
        order::{
            CreateOrderRequest, MessageRequest, MessageResponse, MessageRow, ORDER_SELECT,
            OrderListParams, OrderListResponse, OrderResponse, OrderRow, OrderStatus,
            Participation, PaymentStatus, RatingRequest, TransitionPolicy, UpdatePaymentRequest,
            UpdateStatusRequest, default_delivery_date, next_rating_average, validate_score,
        },
        pagination::{PageMeta, Pagination},
    },
    utils::{
        html::{clean_html, clean_required},
        jwt::Claims,
    },
};

const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_REVIEW_CHARS: usize = 2000;

const MESSAGE_SELECT: &str = r#"
    SELECT
        m.id, m.sender_id, m.body, m.created_at,
        u.name AS sender_name, u.email AS sender_email, u.avatar AS sender_avatar
    FROM order_messages m
    JOIN users u ON u.id = m.sender_id
    WHERE m.order_id = $1
    ORDER BY m.id ASC
"#;

/// The fields needed to authorize a mutation, read without the joins.
#[derive(Debug, FromRow)]
struct OrderParties {
    buyer_id: i64,
    seller_id: i64,
    service_id: i64,
    status: String,
    rating_score: Option<i32>,
    completed_at: Option<DateTime<Utc>>,
}

impl OrderParties {
    fn status(&self) -> Result<OrderStatus, AppError> {
        self.status
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("Corrupt order status '{}'", self.status)))
    }

    fn require_seller(&self, user_id: i64, action: &str) -> Result<(), AppError> {
        if self.seller_id != user_id {
            return Err(AppError::Forbidden(format!("Only the seller can {}", action)));
        }
        Ok(())
    }

    fn require_buyer(&self, user_id: i64, action: &str) -> Result<(), AppError> {
        if self.buyer_id != user_id {
            return Err(AppError::Forbidden(format!("Only the buyer can {}", action)));
        }
        Ok(())
    }
}

const PARTIES_SELECT: &str = "SELECT buyer_id, seller_id, service_id, status, rating_score, completed_at \
     FROM orders WHERE id = $1";

async fn fetch_parties(pool: &PgPool, id: i64) -> Result<OrderParties, AppError> {
    sqlx::query_as::<_, OrderParties>(PARTIES_SELECT)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Order not found".to_string()))
}

/// Reads the parties under a row lock held until the transaction ends.
async fn lock_parties(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<OrderParties, AppError> {
    sqlx::query_as::<_, OrderParties>(&format!("{} FOR UPDATE", PARTIES_SELECT))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("Order not found".to_string()))
}

/// Credits the seller the first time an order reaches completed.
/// `completed_at` is never cleared, so it marks that the credit was given.
async fn credit_first_completion(
    tx: &mut Transaction<'_, Postgres>,
    order: &OrderParties,
) -> Result<bool, AppError> {
    if order.completed_at.is_some() {
        return Ok(false);
    }
    sqlx::query("UPDATE users SET completed_orders = completed_orders + 1 WHERE id = $1")
        .bind(order.seller_id)
        .execute(&mut **tx)
        .await?;
    Ok(true)
}

pub(crate) async fn fetch_order(pool: &PgPool, id: i64) -> Result<OrderRow, AppError> {
    sqlx::query_as::<_, OrderRow>(&format!("{} WHERE o.id = $1", ORDER_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Order not found".to_string()))
}

async fn fetch_messages(pool: &PgPool, order_id: i64) -> Result<Vec<MessageResponse>, AppError> {
    let rows = sqlx::query_as::<_, MessageRow>(MESSAGE_SELECT)
        .bind(order_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(MessageResponse::from).collect())
}

/// Full order view: summaries plus the message thread.
async fn order_detail(pool: &PgPool, id: i64) -> Result<OrderResponse, AppError> {
    let order = fetch_order(pool, id).await?;
    let messages = fetch_messages(pool, id).await?;
    order.into_response(Some(messages))
}

/// Place an order for a listing.
///
/// The buyer is always the authenticated caller. Price and title are copied
/// from the listing so later edits do not reach this order.
pub async fn create_order(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let buyer_id = claims.user_id()?;
    payload.validate()?;

    let service_id = payload.service()?;

    let supplied = payload.supplied_buyer_keys();
    if !supplied.is_empty() {
        tracing::warn!(buyer_id, keys = ?supplied, "ignoring buyer id supplied in request body");
    }

    let service = fetch_service(&pool, service_id).await?;
    let seller_id = payload.freelancer().unwrap_or(service.owner_id);

    if buyer_id == seller_id || buyer_id == service.owner_id {
        return Err(AppError::InvalidOperation(
            "You cannot order your own service".to_string(),
        ));
    }

    if !service.is_active {
        return Err(AppError::InvalidOperation(
            "This service is not currently available".to_string(),
        ));
    }

    if seller_id != service.owner_id {
        fetch_user(&pool, seller_id).await?;
    }

    let delivery_date = payload
        .delivery_date
        .unwrap_or_else(|| default_delivery_date(Utc::now(), &service.delivery_time));
    let payment_method = payload.payment_method.unwrap_or_default();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO orders (
            service_id, buyer_id, seller_id, service_title, total_amount,
            payment_method, requirements, delivery_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(service.id)
    .bind(buyer_id)
    .bind(seller_id)
    .bind(&service.title)
    .bind(service.price)
    .bind(payment_method.as_str())
    .bind(clean_html(payload.requirements.trim()))
    .bind(delivery_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create order: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(
        order_id = id,
        service_id = service.id,
        buyer_id,
        seller_id,
        total_amount = service.price,
        "order created"
    );

    let order = order_detail(&pool, id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Appends the participation and status filters shared by the count and page queries.
fn push_order_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    user_id: i64,
    participation: Participation,
    status: Option<OrderStatus>,
) {
    match participation {
        Participation::Buyer => {
            builder.push(" WHERE o.buyer_id = ");
            builder.push_bind(user_id);
        }
        Participation::Seller => {
            builder.push(" WHERE o.seller_id = ");
            builder.push_bind(user_id);
        }
        Participation::All => {
            builder.push(" WHERE (o.buyer_id = ");
            builder.push_bind(user_id);
            builder.push(" OR o.seller_id = ");
            builder.push_bind(user_id);
            builder.push(")");
        }
    }

    if let Some(status) = status {
        builder.push(" AND o.status = ");
        builder.push_bind(status.as_str());
    }
}

/// List the caller's orders, newest first.
pub async fn list_orders(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<OrderListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let participation = Participation::parse(params.kind.as_deref())?;
    let status = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let pagination = Pagination::new(params.page, params.limit);

    let mut count_query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM orders o");
    push_order_filters(&mut count_query, user_id, participation, status);
    let total: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;

    let mut page_query: QueryBuilder<Postgres> = QueryBuilder::new(ORDER_SELECT);
    push_order_filters(&mut page_query, user_id, participation, status);
    page_query.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ");
    page_query.push_bind(pagination.limit);
    page_query.push(" OFFSET ");
    page_query.push_bind(pagination.offset());

    let rows = page_query
        .build_query_as::<OrderRow>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list orders: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let orders = rows
        .into_iter()
        .map(|row| row.into_response(None))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(OrderListResponse {
        orders,
        meta: PageMeta::new(total, pagination),
    }))
}

/// Get one order with its messages. Parties only.
pub async fn get_order(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let order = fetch_order(&pool, id).await?;
    if !order.is_party(user_id) {
        return Err(AppError::Forbidden(
            "You are not a party to this order".to_string(),
        ));
    }

    let messages = fetch_messages(&pool, id).await?;
    Ok(Json(order.into_response(Some(messages))?))
}

/// Change the order status. Seller only.
///
/// The new value is checked against the status enum before anything is read.
/// The write only lands if the status is still the one that was checked.
/// Entering completed credits the seller once per order, as `/complete` does.
pub async fn update_status(
    State(pool): State<PgPool>,
    State(policy): State<TransitionPolicy>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let next: OrderStatus = payload.status.trim().parse()?;

    let order = fetch_parties(&pool, id).await?;
    order.require_seller(user_id, "update the order status")?;

    let current = order.status()?;
    policy.check(current, next)?;

    let mut tx = pool.begin().await?;

    let locked = lock_parties(&mut tx, id).await?;
    if locked.status != current.as_str() {
        return Err(AppError::Conflict(
            "Order status was changed by another request; reload and try again".to_string(),
        ));
    }

    sqlx::query(
        r#"
        UPDATE orders
        SET status = $1,
            completed_at = CASE WHEN $2 THEN COALESCE(completed_at, NOW()) ELSE completed_at END,
            updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(next.as_str())
    .bind(next == OrderStatus::Completed)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let credited = next == OrderStatus::Completed && credit_first_completion(&mut tx, &locked).await?;

    tx.commit().await?;

    tracing::info!(order_id = id, from = %current, to = %next, credited, "order status changed");

    Ok(Json(order_detail(&pool, id).await?))
}

/// Mark the order completed. Seller only.
///
/// Skips the transition table. The seller's completed-orders counter moves
/// once per order, however many times the order is completed.
pub async fn complete_order(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let order = lock_parties(&mut tx, id).await?;
    order.require_seller(user_id, "complete this order")?;

    if order.status()? != OrderStatus::Completed {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = 'completed', completed_at = COALESCE(completed_at, NOW()), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let credited = credit_first_completion(&mut tx, &order).await?;
        tracing::info!(order_id = id, seller_id = order.seller_id, credited, "order completed");
    }

    tx.commit().await?;

    Ok(Json(order_detail(&pool, id).await?))
}

/// Change the payment status. Buyer only; independent of the order status.
pub async fn update_payment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let payment_status: PaymentStatus = payload.payment_status.trim().parse()?;

    let order = fetch_parties(&pool, id).await?;
    order.require_buyer(user_id, "update the payment status")?;

    sqlx::query("UPDATE orders SET payment_status = $1, updated_at = NOW() WHERE id = $2")
        .bind(payment_status.as_str())
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(order_detail(&pool, id).await?))
}

/// Append a message to the order thread. Buyer or seller only.
/// Each message is its own row, so concurrent appends never overwrite each other.
pub async fn add_message(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<MessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if payload.message.trim().chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    let text = clean_required(&payload.message)
        .ok_or(AppError::BadRequest("Message cannot be empty".to_string()))?;

    let order = fetch_parties(&pool, id).await?;
    if order.buyer_id != user_id && order.seller_id != user_id {
        return Err(AppError::Forbidden(
            "You are not a party to this order".to_string(),
        ));
    }

    let message = sqlx::query_as::<_, MessageRow>(
        r#"
        WITH inserted AS (
            INSERT INTO order_messages (order_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, sender_id, body, created_at
        )
        SELECT
            i.id, i.sender_id, i.body, i.created_at,
            u.name AS sender_name, u.email AS sender_email, u.avatar AS sender_avatar
        FROM inserted i
        JOIN users u ON u.id = i.sender_id
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(text)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to append message: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Attach the buyer's rating to a completed order and fold it into the
/// seller's and the listing's running averages.
///
/// Preconditions are checked in order under the order's row lock: buyer,
/// completed, not yet rated, score in 1..=5. The body fields are only read
/// once the caller and the order qualify. All three writes share one
/// transaction.
pub async fn add_rating(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<RatingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let order = lock_parties(&mut tx, id).await?;
    order.require_buyer(user_id, "rate this order")?;

    if order.status()? != OrderStatus::Completed {
        return Err(AppError::InvalidOperation(
            "Only completed orders can be rated".to_string(),
        ));
    }

    if order.rating_score.is_some() {
        return Err(AppError::Conflict(
            "This order has already been rated".to_string(),
        ));
    }

    let score = validate_score(&payload.score)?;

    let review = payload.review_text()?;
    if review.chars().count() > MAX_REVIEW_CHARS {
        return Err(AppError::BadRequest(format!(
            "Review must be at most {} characters",
            MAX_REVIEW_CHARS
        )));
    }

    sqlx::query(
        r#"
        UPDATE orders
        SET rating_score = $1, rating_review = $2, rated_at = NOW(), updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(score)
    .bind(clean_html(review))
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let (seller_avg, seller_count): (f64, i32) =
        sqlx::query_as("SELECT rating, review_count FROM users WHERE id = $1 FOR UPDATE")
            .bind(order.seller_id)
            .fetch_one(&mut *tx)
            .await?;
    let (seller_avg, seller_count) = next_rating_average(seller_avg, seller_count, score);

    sqlx::query("UPDATE users SET rating = $1, review_count = $2 WHERE id = $3")
        .bind(seller_avg)
        .bind(seller_count)
        .bind(order.seller_id)
        .execute(&mut *tx)
        .await?;

    let (service_avg, service_count): (f64, i32) =
        sqlx::query_as("SELECT rating, review_count FROM services WHERE id = $1 FOR UPDATE")
            .bind(order.service_id)
            .fetch_one(&mut *tx)
            .await?;
    let (service_avg, service_count) = next_rating_average(service_avg, service_count, score);

    sqlx::query("UPDATE services SET rating = $1, review_count = $2 WHERE id = $3")
        .bind(service_avg)
        .bind(service_count)
        .bind(order.service_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        order_id = id,
        seller_id = order.seller_id,
        score,
        seller_rating = seller_avg,
        "order rated"
    );

    Ok(Json(order_detail(&pool, id).await?))
}
