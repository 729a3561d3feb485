// src/models/order.rs

use std::{collections::HashMap, fmt, str::FromStr, sync::LazyLock};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    error::AppError,
    models::{pagination::PageMeta, user::UserSummary},
};

/// Delivery window used when a listing's delivery text cannot be read.
pub const DEFAULT_DELIVERY_DAYS: i64 = 7;

/// Order lifecycle label. Stored as its kebab-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Disputed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::InProgress => "in-progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
        }
    }

    /// Pending, accepted and in-progress orders still need work.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Accepted | OrderStatus::InProgress
        )
    }

    /// Forward transition table. Completed and cancelled are terminal;
    /// a disputed order can resume, complete or be cancelled.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, InProgress)
                | (Accepted, Cancelled)
                | (Accepted, Disputed)
                | (InProgress, Completed)
                | (InProgress, Disputed)
                | (Disputed, InProgress)
                | (Disputed, Completed)
                | (Disputed, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid status '{}'. Expected one of: pending, accepted, in-progress, completed, cancelled, disputed.",
                    raw
                ))
            })
    }
}

/// How the generic status endpoint treats the move from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Only moves in `OrderStatus::can_transition_to` are accepted.
    Strict,
    /// Any status may follow any other.
    Permissive,
}

impl TransitionPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    pub fn check(&self, current: OrderStatus, next: OrderStatus) -> Result<(), AppError> {
        match self {
            TransitionPolicy::Permissive => Ok(()),
            TransitionPolicy::Strict if current.can_transition_to(next) => Ok(()),
            TransitionPolicy::Strict => Err(AppError::InvalidOperation(format!(
                "Cannot change order status from '{}' to '{}'",
                current, next
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
    Paypal,
    BankTransfer,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit-card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank-transfer",
            PaymentMethod::Crypto => "crypto",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        [
            PaymentMethod::CreditCard,
            PaymentMethod::Paypal,
            PaymentMethod::BankTransfer,
            PaymentMethod::Crypto,
        ]
        .into_iter()
        .find(|method| method.as_str() == raw)
        .ok_or_else(|| AppError::InternalServerError(format!("Unknown payment method '{}'", raw)))
    }
}

/// Tracked independently of the order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(AppError::BadRequest(format!(
                "Invalid payment status '{}'. Expected 'pending' or 'paid'.",
                other
            ))),
        }
    }
}

static DELIVERY_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(day|week|month)").expect("valid regex"));

/// Reads a listing's free-text delivery time as a number of days.
///
/// The first `<n> day`, `<n> week` or `<n> month` wins (weeks are 7 days,
/// months 30). Anything else is the 7-day default.
pub fn delivery_days(delivery_time: &str) -> i64 {
    let Some(caps) = DELIVERY_TIME_RE.captures(delivery_time) else {
        return DEFAULT_DELIVERY_DAYS;
    };
    let Ok(n) = caps[1].parse::<i64>() else {
        return DEFAULT_DELIVERY_DAYS;
    };
    let unit = caps[2].to_ascii_lowercase();
    let days = match unit.as_str() {
        "day" => Some(n),
        "week" => n.checked_mul(7),
        _ => n.checked_mul(30),
    };
    days.unwrap_or(DEFAULT_DELIVERY_DAYS)
}

/// Delivery date for an order placed at `now` without an explicit date.
/// Offsets too large to represent fall back to the default window.
pub fn default_delivery_date(now: DateTime<Utc>, delivery_time: &str) -> DateTime<Utc> {
    let offset = |days: i64| TimeDelta::try_days(days).and_then(|d| now.checked_add_signed(d));
    offset(delivery_days(delivery_time))
        .or_else(|| offset(DEFAULT_DELIVERY_DAYS))
        .unwrap_or(now)
}

/// A rating score must be a JSON number holding a whole value from 1 to 5.
pub fn validate_score(score: &serde_json::Value) -> Result<i32, AppError> {
    match score.as_f64() {
        Some(n) if n.fract() == 0.0 && (1.0..=5.0).contains(&n) => Ok(n as i32),
        _ => Err(AppError::BadRequest(
            "Rating score must be an integer between 1 and 5".to_string(),
        )),
    }
}

/// Running average after one more review: `(avg * n + score) / (n + 1)`.
pub fn next_rating_average(old_avg: f64, old_count: i32, score: i32) -> (f64, i32) {
    let count = old_count.max(0);
    let new_count = count + 1;
    let new_avg = (old_avg * f64::from(count) + f64::from(score)) / f64::from(new_count);
    (new_avg, new_count)
}

/// Joined projection shared by order list and detail reads. Matches `OrderRow`.
pub const ORDER_SELECT: &str = r#"
    SELECT
        o.id, o.service_id, o.buyer_id, o.seller_id, o.service_title, o.total_amount,
        o.payment_method, o.payment_status, o.status, o.requirements, o.delivery_date,
        o.rating_score, o.rating_review, o.rated_at, o.completed_at,
        o.created_at, o.updated_at,
        s.title AS svc_title, s.price AS svc_price, s.category AS svc_category,
        b.name AS buyer_name, b.email AS buyer_email, b.avatar AS buyer_avatar,
        sl.name AS seller_name, sl.email AS seller_email, sl.avatar AS seller_avatar
    FROM orders o
    JOIN services s ON s.id = o.service_id
    JOIN users b ON b.id = o.buyer_id
    JOIN users sl ON sl.id = o.seller_id
"#;

#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub service_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    /// Listing title at order time.
    pub service_title: String,
    /// Listing price at order time. Never re-read from the listing.
    pub total_amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub status: String,
    pub requirements: String,
    pub delivery_date: DateTime<Utc>,
    pub rating_score: Option<i32>,
    pub rating_review: Option<String>,
    pub rated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub svc_title: String,
    pub svc_price: f64,
    pub svc_category: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_avatar: Option<String>,
    pub seller_name: String,
    pub seller_email: String,
    pub seller_avatar: Option<String>,
}

impl OrderRow {
    pub fn is_party(&self, user_id: i64) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    pub fn into_response(self, messages: Option<Vec<MessageResponse>>) -> Result<OrderResponse, AppError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|_| AppError::InternalServerError(format!("Corrupt order status '{}'", self.status)))?;
        let payment_status = self
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(|_| {
                AppError::InternalServerError(format!("Corrupt payment status '{}'", self.payment_status))
            })?;
        let payment_method = self.payment_method.parse::<PaymentMethod>()?;

        let rating = match (self.rating_score, self.rated_at) {
            (Some(score), Some(reviewed_at)) => Some(RatingResponse {
                score,
                review: self.rating_review.unwrap_or_default(),
                reviewed_at,
            }),
            _ => None,
        };

        Ok(OrderResponse {
            id: self.id,
            service: ServiceSummary {
                id: self.service_id,
                title: self.svc_title,
                price: self.svc_price,
                category: self.svc_category,
            },
            service_title: self.service_title,
            buyer: UserSummary {
                id: self.buyer_id,
                name: self.buyer_name,
                email: self.buyer_email,
                avatar: self.buyer_avatar,
            },
            seller: UserSummary {
                id: self.seller_id,
                name: self.seller_name,
                email: self.seller_email,
                avatar: self.seller_avatar,
            },
            total_amount: self.total_amount,
            payment_method,
            payment_status,
            status,
            requirements: self.requirements,
            delivery_date: self.delivery_date,
            rating,
            messages,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Lightweight view of the linked listing (live values).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSummary {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    pub score: i32,
    pub review: String,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub service: ServiceSummary,
    pub service_title: String,
    pub buyer: UserSummary,
    pub seller: UserSummary,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub requirements: String,
    pub delivery_date: DateTime<Utc>,
    pub rating: Option<RatingResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageResponse>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// A row of 'order_messages' joined with its sender.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub sender_name: String,
    pub sender_email: String,
    pub sender_avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender: UserSummary,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            sender: UserSummary {
                id: row.sender_id,
                name: row.sender_name,
                email: row.sender_email,
                avatar: row.sender_avatar,
            },
            text: row.body,
            timestamp: row.created_at,
        }
    }
}

/// Body keys some clients use to name the buyer. They are never trusted.
pub const BUYER_ID_KEYS: [&str; 6] = ["buyerId", "buyer_id", "buyer", "client", "clientId", "client_id"];

/// DTO for placing an order.
///
/// Both clients' field spellings are accepted and may appear together; the
/// accessors pick one by precedence. Unknown keys land in `extra`, which is
/// where a body-supplied buyer id is found and reported.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub service_id: Option<i64>,
    pub service: Option<i64>,
    pub freelancer_id: Option<i64>,
    pub seller_id: Option<i64>,
    pub seller: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 5000, message = "Requirements must be at most 5000 characters"))]
    pub requirements: String,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub delivery_date: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CreateOrderRequest {
    /// `serviceId` wins over `service`.
    pub fn service(&self) -> Result<i64, AppError> {
        self.service_id
            .or(self.service)
            .ok_or(AppError::BadRequest("serviceId is required".to_string()))
    }

    /// `freelancerId`, then `sellerId`, then `seller`.
    pub fn freelancer(&self) -> Option<i64> {
        self.freelancer_id.or(self.seller_id).or(self.seller)
    }

    /// Buyer keys present in the body, in `BUYER_ID_KEYS` order.
    pub fn supplied_buyer_keys(&self) -> Vec<&'static str> {
        BUYER_ID_KEYS
            .into_iter()
            .filter(|key| self.extra.get(*key).is_some_and(|v| !v.is_null()))
            .collect()
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid deliveryDate '{}'", raw)))
}

/// Status arrives as a raw string so an unknown value is a 400 with the
/// allowed list, not a JSON rejection.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    #[serde(alias = "payment_status")]
    pub payment_status: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(alias = "text")]
    pub message: String,
}

/// Fields stay raw JSON so a malformed score or review is reported after the
/// caller and order checks, not as a body rejection.
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    #[serde(default)]
    pub score: serde_json::Value,
    #[serde(default)]
    pub review: serde_json::Value,
}

impl RatingRequest {
    /// Trimmed review text; absent or null is an empty review.
    pub fn review_text(&self) -> Result<&str, AppError> {
        match &self.review {
            serde_json::Value::Null => Ok(""),
            serde_json::Value::String(text) => Ok(text.trim()),
            _ => Err(AppError::BadRequest("Review must be a string".to_string())),
        }
    }
}

/// Which side of the order the caller must be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    Buyer,
    Seller,
    All,
}

impl Participation {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Ok(Participation::All),
            Some("buyer") => Ok(Participation::Buyer),
            Some("seller") => Ok(Participation::Seller),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid type '{}'. Expected buyer, seller or all.",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_enum_is_closed() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        for bad in ["", "done", "Completed", "in_progress", "shipped"] {
            assert!(matches!(bad.parse::<OrderStatus>(), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(OrderStatus::InProgress).unwrap(),
            serde_json::json!("in-progress")
        );
        assert_eq!(
            serde_json::to_value(PaymentMethod::BankTransfer).unwrap(),
            serde_json::json!("bank-transfer")
        );
    }

    #[test]
    fn strict_policy_follows_forward_table() {
        let strict = TransitionPolicy::Strict;
        assert!(strict.check(OrderStatus::Pending, OrderStatus::Accepted).is_ok());
        assert!(strict.check(OrderStatus::Accepted, OrderStatus::InProgress).is_ok());
        assert!(strict.check(OrderStatus::InProgress, OrderStatus::Completed).is_ok());
        assert!(strict.check(OrderStatus::Pending, OrderStatus::Cancelled).is_ok());
        assert!(strict.check(OrderStatus::InProgress, OrderStatus::Disputed).is_ok());

        assert!(matches!(
            strict.check(OrderStatus::Pending, OrderStatus::Completed),
            Err(AppError::InvalidOperation(_))
        ));
        assert!(strict.check(OrderStatus::Completed, OrderStatus::Pending).is_err());
        assert!(strict.check(OrderStatus::Cancelled, OrderStatus::Accepted).is_err());
        assert!(strict.check(OrderStatus::Pending, OrderStatus::Pending).is_err());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Completed.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn permissive_policy_allows_any_move() {
        let permissive = TransitionPolicy::from_strict(false);
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert!(permissive.check(from, to).is_ok());
            }
        }
    }

    #[test]
    fn delivery_time_text_is_parsed() {
        assert_eq!(delivery_days("5 days"), 5);
        assert_eq!(delivery_days("2 weeks"), 14);
        assert_eq!(delivery_days("1 month"), 30);
        assert_eq!(delivery_days("garbage"), 7);
        assert_eq!(delivery_days("1 Day"), 1);
        assert_eq!(delivery_days("Delivered in 3days"), 3);
        assert_eq!(delivery_days(""), 7);
    }

    #[test]
    fn default_delivery_date_lands_on_expected_day() {
        let now = Utc::now();
        for (text, days) in [("5 days", 5), ("2 weeks", 14), ("1 month", 30), ("garbage", 7)] {
            let expected = (now + TimeDelta::days(days)).date_naive();
            assert_eq!(default_delivery_date(now, text).date_naive(), expected, "{}", text);
        }
    }

    #[test]
    fn absurd_delivery_time_falls_back() {
        let now = Utc::now();
        let date = default_delivery_date(now, "99999999999999 months");
        assert_eq!(date.date_naive(), (now + TimeDelta::days(7)).date_naive());
    }

    #[test]
    fn score_must_be_whole_and_in_range() {
        use serde_json::json;

        assert_eq!(validate_score(&json!(1)).unwrap(), 1);
        assert_eq!(validate_score(&json!(5.0)).unwrap(), 5);
        for bad in [json!(0), json!(6), json!(4.5), json!(-1), json!("5"), json!(null), json!([5])] {
            assert!(matches!(validate_score(&bad), Err(AppError::BadRequest(_))), "{}", bad);
        }
    }

    #[test]
    fn rating_body_accepts_any_shape() {
        let req: RatingRequest =
            serde_json::from_value(serde_json::json!({ "score": "5", "review": 3 })).unwrap();
        assert!(validate_score(&req.score).is_err());
        assert!(req.review_text().is_err());

        let req: RatingRequest = serde_json::from_value(serde_json::json!({ "score": 4 })).unwrap();
        assert_eq!(req.review_text().unwrap(), "");

        let req: RatingRequest =
            serde_json::from_value(serde_json::json!({ "score": 4, "review": "  Great work " })).unwrap();
        assert_eq!(req.review_text().unwrap(), "Great work");
    }

    #[test]
    fn running_average_matches_weighted_mean() {
        let (avg, count) = next_rating_average(4.0, 2, 5);
        assert!((avg - 13.0 / 3.0).abs() < 1e-9);
        assert_eq!(count, 3);

        let (avg, count) = next_rating_average(0.0, 0, 3);
        assert_eq!((avg, count), (3.0, 1));
    }

    #[test]
    fn create_request_accepts_legacy_names() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "service": 7,
            "sellerId": 3,
            "requirements": "Logo in SVG",
            "deliveryDate": "2030-01-15",
            "clientId": 99
        }))
        .unwrap();

        assert_eq!(req.service().unwrap(), 7);
        assert_eq!(req.freelancer(), Some(3));
        assert_eq!(req.supplied_buyer_keys(), vec!["clientId"]);
        assert_eq!(
            req.delivery_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()
        );
        assert_eq!(req.payment_method.unwrap_or_default(), PaymentMethod::CreditCard);
    }

    #[test]
    fn create_request_tolerates_every_spelling_at_once() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "serviceId": 1,
            "service": 2,
            "freelancerId": 5,
            "seller": 6,
            "buyerId": 2,
            "client": 3,
            "buyer": { "id": 4 }
        }))
        .unwrap();

        assert_eq!(req.service().unwrap(), 1);
        assert_eq!(req.freelancer(), Some(5));
        assert_eq!(req.supplied_buyer_keys(), vec!["buyerId", "buyer", "client"]);
    }

    #[test]
    fn create_request_without_service_is_rejected() {
        let req: CreateOrderRequest =
            serde_json::from_value(serde_json::json!({ "sellerId": 3 })).unwrap();
        assert!(matches!(req.service(), Err(AppError::BadRequest(_))));
        assert_eq!(req.freelancer(), Some(3));
        assert!(req.supplied_buyer_keys().is_empty());
    }

    #[test]
    fn participation_filter_parses() {
        assert_eq!(Participation::parse(None).unwrap(), Participation::All);
        assert_eq!(Participation::parse(Some("seller")).unwrap(), Participation::Seller);
        assert!(Participation::parse(Some("everyone")).is_err());
    }
}
