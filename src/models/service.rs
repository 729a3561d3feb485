// src/models/service.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{error::AppError, models::pagination::PageMeta};

/// Service columns joined with the owner's display fields. Matches `ServiceRow`.
pub const SERVICE_SELECT: &str = r#"
    SELECT
        s.id, s.owner_id, s.title, s.description, s.category, s.price,
        s.delivery_time, s.tags, s.image, s.is_active, s.rating, s.review_count,
        s.created_at, s.updated_at,
        u.name AS owner_name, u.avatar AS owner_avatar, u.rating AS owner_rating
    FROM services s
    JOIN users u ON u.id = s.owner_id
"#;

/// A row of the 'services' table plus its owner summary.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRow {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    /// Free-text duration such as "5 days" or "2 weeks".
    pub delivery_time: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub rating: f64,
    pub review_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub owner_name: String,
    pub owner_avatar: Option<String>,
    pub owner_rating: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub delivery_time: String,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub rating: f64,
    pub review_count: i32,
    pub owner: OwnerSummary,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct OwnerSummary {
    pub id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub rating: f64,
}

impl From<ServiceRow> for ServiceResponse {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            price: row.price,
            delivery_time: row.delivery_time,
            tags: row.tags,
            image: row.image,
            is_active: row.is_active,
            rating: row.rating,
            review_count: row.review_count,
            owner: OwnerSummary {
                id: row.owner_id,
                name: row.owner_name,
                avatar: row.owner_avatar,
                rating: row.owner_rating,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceResponse>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// DTO for creating a new listing.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 200), custom(function = crate::models::validate_not_blank))]
    pub title: String,
    #[validate(length(min = 1, max = 5000), custom(function = crate::models::validate_not_blank))]
    pub description: String,
    #[validate(length(min = 1, max = 100), custom(function = crate::models::validate_not_blank))]
    pub category: String,
    #[validate(range(exclusive_min = 0.0, message = "Price must be positive."))]
    pub price: f64,
    #[validate(length(min = 1, max = 100), custom(function = crate::models::validate_not_blank))]
    #[serde(alias = "delivery_time")]
    pub delivery_time: String,
    #[serde(default)]
    #[validate(length(max = 20), custom(function = validate_tags))]
    pub tags: Vec<String>,
    #[validate(length(max = 500), custom(function = crate::models::validate_url_string))]
    pub image: Option<String>,
}

/// DTO for a partial listing update. Owner only.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    #[validate(length(min = 1, max = 200), custom(function = crate::models::validate_not_blank))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000), custom(function = crate::models::validate_not_blank))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = crate::models::validate_not_blank))]
    pub category: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "Price must be positive."))]
    pub price: Option<f64>,
    #[validate(length(min = 1, max = 100), custom(function = crate::models::validate_not_blank))]
    #[serde(alias = "delivery_time")]
    pub delivery_time: Option<String>,
    #[validate(length(max = 20), custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 500), custom(function = crate::models::validate_url_string))]
    pub image: Option<String>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

impl UpdateServiceRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.delivery_time.is_none()
            && self.tags.is_none()
            && self.image.is_none()
            && self.is_active.is_none()
    }
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 50) {
        return Err(validator::ValidationError::new("invalid_tag"));
    }
    Ok(())
}

/// Trims, lowercases and de-duplicates tags, keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Escapes `LIKE` wildcards so user text matches literally under `ESCAPE '\'`.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Query parameters for searching listings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListParams {
    pub category: Option<String>,
    /// Case-insensitive substring match on title or description.
    pub q: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    #[serde(alias = "owner", alias = "sellerId")]
    pub freelancer_id: Option<i64>,
    pub tag: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceSort {
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

impl ServiceSort {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim) {
            None | Some("") | Some("newest") => Ok(ServiceSort::Newest),
            Some("price_asc") => Ok(ServiceSort::PriceAsc),
            Some("price_desc") => Ok(ServiceSort::PriceDesc),
            Some("rating") => Ok(ServiceSort::Rating),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid sort '{}'. Expected newest, price_asc, price_desc or rating.",
                other
            ))),
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            ServiceSort::Newest => " ORDER BY s.created_at DESC, s.id DESC",
            ServiceSort::PriceAsc => " ORDER BY s.price ASC, s.id DESC",
            ServiceSort::PriceDesc => " ORDER BY s.price DESC, s.id DESC",
            ServiceSort::Rating => " ORDER BY s.rating DESC, s.review_count DESC, s.id DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_defaults_to_newest() {
        assert_eq!(ServiceSort::parse(None).unwrap(), ServiceSort::Newest);
        assert_eq!(ServiceSort::parse(Some("rating")).unwrap(), ServiceSort::Rating);
        assert!(ServiceSort::parse(Some("cheapest")).is_err());
    }

    #[test]
    fn tags_are_normalized() {
        let tags = vec![" Rust ".into(), "rust".into(), "".into(), "API".into()];
        assert_eq!(normalize_tags(tags), vec!["rust".to_string(), "api".to_string()]);
    }

    #[test]
    fn non_positive_price_fails_validation() {
        let req: CreateServiceRequest = serde_json::from_value(serde_json::json!({
            "title": "Logo design",
            "description": "Vector logo",
            "category": "design",
            "price": 0.0,
            "deliveryTime": "3 days"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn whitespace_only_title_fails_validation() {
        let req: CreateServiceRequest = serde_json::from_value(serde_json::json!({
            "title": "   ",
            "description": "Vector logo",
            "category": "design",
            "price": 10.0,
            "deliveryTime": "3 days"
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let update: UpdateServiceRequest =
            serde_json::from_value(serde_json::json!({ "category": "  " })).unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("logo"), "logo");
    }
}
