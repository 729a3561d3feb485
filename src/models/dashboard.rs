// src/models/dashboard.rs

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::AppError,
    models::{order::OrderResponse, service::ServiceResponse},
};

/// Number of recent orders/services shown on the dashboard.
pub const RECENT_LIMIT: i64 = 5;

/// `sum / count`, or 0 when there is nothing to average.
pub fn average(sum: f64, count: i64) -> f64 {
    if count <= 0 { 0.0 } else { sum / count as f64 }
}

#[derive(Debug, FromRow)]
pub struct FreelancerStatsRow {
    pub active_services: i64,
    pub total_orders: i64,
    pub completed_orders: i64,
    pub earnings: f64,
}

#[derive(Debug, FromRow)]
pub struct ClientStatsRow {
    pub total_orders: i64,
    pub active_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    pub total_spent: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerStats {
    pub active_services: i64,
    pub total_orders: i64,
    pub completed_orders: i64,
    pub earnings: f64,
    pub average_order_value: f64,
    pub rating: f64,
    pub review_count: i32,
}

impl FreelancerStats {
    pub fn new(row: FreelancerStatsRow, rating: f64, review_count: i32) -> Self {
        Self {
            average_order_value: average(row.earnings, row.completed_orders),
            active_services: row.active_services,
            total_orders: row.total_orders,
            completed_orders: row.completed_orders,
            earnings: row.earnings,
            rating,
            review_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub total_orders: i64,
    pub active_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
    pub total_spent: f64,
    pub average_order_value: f64,
}

impl From<ClientStatsRow> for ClientStats {
    fn from(row: ClientStatsRow) -> Self {
        Self {
            average_order_value: average(row.total_spent, row.total_orders),
            total_orders: row.total_orders,
            active_orders: row.active_orders,
            completed_orders: row.completed_orders,
            cancelled_orders: row.cancelled_orders,
            total_spent: row.total_spent,
        }
    }
}

/// Role-specific statistics, tagged with the role they were computed for.
#[derive(Debug, Serialize)]
#[serde(tag = "role", content = "stats", rename_all = "lowercase")]
pub enum DashboardStats {
    Freelancer(FreelancerStats),
    Client(ClientStats),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub recent_orders: Vec<OrderResponse>,
    /// Only present for freelancers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_services: Option<Vec<ServiceResponse>>,
}

/// Window of the earnings chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EarningsPeriod {
    Week,
    Month,
    Year,
}

impl EarningsPeriod {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim) {
            None | Some("") | Some("month") => Ok(EarningsPeriod::Month),
            Some("week") => Ok(EarningsPeriod::Week),
            Some("year") => Ok(EarningsPeriod::Year),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid period '{}'. Expected week, month or year.",
                other
            ))),
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            EarningsPeriod::Week => 7,
            EarningsPeriod::Month => 30,
            EarningsPeriod::Year => 365,
        }
    }

    /// Earliest completion time included in the window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::days(self.days())
    }
}

#[derive(Debug, Deserialize)]
pub struct EarningsParams {
    pub period: Option<String>,
}

/// One (year, month, day) bucket of completed-order revenue.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct EarningsBucket {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub total: f64,
    pub orders: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsResponse {
    pub period: EarningsPeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: f64,
    pub buckets: Vec<EarningsBucket>,
}
