// src/handlers/dashboard.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::users::fetch_user,
    models::{
        dashboard::{
            ActivityResponse, ClientStats, ClientStatsRow, DashboardStats, EarningsBucket,
            EarningsParams, EarningsPeriod, EarningsResponse, FreelancerStats,
            FreelancerStatsRow, RECENT_LIMIT,
        },
        order::{ORDER_SELECT, OrderRow},
        service::{SERVICE_SELECT, ServiceResponse, ServiceRow},
        user::Role,
    },
    utils::jwt::Claims,
};

/// Counts and sums over the caller's orders, shaped by their role.
pub async fn get_stats(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, claims.user_id()?).await?;

    let stats = match user.role() {
        Role::Freelancer => {
            let row = sqlx::query_as::<_, FreelancerStatsRow>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM services WHERE owner_id = $1 AND is_active) AS active_services,
                    COUNT(*) AS total_orders,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed_orders,
                    COALESCE(SUM(total_amount) FILTER (WHERE status = 'completed'), 0)::DOUBLE PRECISION AS earnings
                FROM orders
                WHERE seller_id = $1
                "#,
            )
            .bind(user.id)
            .fetch_one(&pool)
            .await?;

            DashboardStats::Freelancer(FreelancerStats::new(row, user.rating, user.review_count))
        }
        Role::Client => {
            let row = sqlx::query_as::<_, ClientStatsRow>(
                r#"
                SELECT
                    COUNT(*) AS total_orders,
                    COUNT(*) FILTER (WHERE status IN ('pending', 'accepted', 'in-progress')) AS active_orders,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed_orders,
                    COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders,
                    COALESCE(SUM(total_amount), 0)::DOUBLE PRECISION AS total_spent
                FROM orders
                WHERE buyer_id = $1
                "#,
            )
            .bind(user.id)
            .fetch_one(&pool)
            .await?;

            DashboardStats::Client(ClientStats::from(row))
        }
    };

    Ok(Json(stats))
}

/// Most recent orders on the caller's side of the market, plus the newest
/// active listings for freelancers.
pub async fn get_activity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, claims.user_id()?).await?;
    let role = user.role();

    let party_column = match role {
        Role::Freelancer => "o.seller_id",
        Role::Client => "o.buyer_id",
    };

    let recent_orders = sqlx::query_as::<_, OrderRow>(&format!(
        "{} WHERE {} = $1 ORDER BY o.created_at DESC, o.id DESC LIMIT $2",
        ORDER_SELECT, party_column
    ))
    .bind(user.id)
    .bind(RECENT_LIMIT)
    .fetch_all(&pool)
    .await?
    .into_iter()
    .map(|row| row.into_response(None))
    .collect::<Result<Vec<_>, _>>()?;

    let recent_services = match role {
        Role::Freelancer => {
            let rows = sqlx::query_as::<_, ServiceRow>(&format!(
                "{} WHERE s.owner_id = $1 AND s.is_active ORDER BY s.created_at DESC, s.id DESC LIMIT $2",
                SERVICE_SELECT
            ))
            .bind(user.id)
            .bind(RECENT_LIMIT)
            .fetch_all(&pool)
            .await?;
            Some(rows.into_iter().map(ServiceResponse::from).collect())
        }
        Role::Client => None,
    };

    Ok(Json(ActivityResponse {
        recent_orders,
        recent_services,
    }))
}

/// Completed-order revenue per calendar day (UTC) over the chosen window.
pub async fn get_earnings(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<EarningsParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let period = EarningsPeriod::parse(params.period.as_deref())?;

    let now = Utc::now();
    let from = period.window_start(now);

    let buckets = sqlx::query_as::<_, EarningsBucket>(
        r#"
        SELECT
            EXTRACT(YEAR FROM completed_at AT TIME ZONE 'UTC')::INT AS year,
            EXTRACT(MONTH FROM completed_at AT TIME ZONE 'UTC')::INT AS month,
            EXTRACT(DAY FROM completed_at AT TIME ZONE 'UTC')::INT AS day,
            SUM(total_amount)::DOUBLE PRECISION AS total,
            COUNT(*) AS orders
        FROM orders
        WHERE seller_id = $1
          AND status = 'completed'
          AND completed_at >= $2
        GROUP BY 1, 2, 3
        ORDER BY 1, 2, 3
        "#,
    )
    .bind(user_id)
    .bind(from)
    .fetch_all(&pool)
    .await?;

    let total: f64 = buckets.iter().map(|b| b.total).sum();

    Ok(Json(EarningsResponse {
        period,
        from,
        to: now,
        total,
        buckets,
    }))
}
