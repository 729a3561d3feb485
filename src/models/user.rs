// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Column list matching `User`'s `FromRow` layout.
pub const USER_COLUMNS: &str = "id, name, email, password, role, account_type, bio, skills, \
     hourly_rate, location, avatar, rating, review_count, completed_orders, created_at";

/// Canonical account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Freelancer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Freelancer => "freelancer",
        }
    }

    /// Accepts the canonical names plus the buyer/seller spellings older
    /// clients send.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "client" | "buyer" => Some(Role::Client),
            "freelancer" | "seller" => Some(Role::Freelancer),
            _ => None,
        }
    }

    /// Resolves a stored record to one role: `role` wins when it holds a known
    /// value, then the legacy `account_type`, then client.
    pub fn reconcile(role: Option<&str>, account_type: Option<&str>) -> Role {
        role.and_then(Role::parse)
            .or_else(|| account_type.and_then(Role::parse))
            .unwrap_or(Role::Client)
    }

    /// Resolves a registration payload. Unlike `reconcile`, an unknown value is
    /// rejected instead of silently falling back.
    pub fn from_input(role: Option<&str>, account_type: Option<&str>) -> Result<Role, AppError> {
        match role.or(account_type) {
            None => Ok(Role::Client),
            Some(raw) => Role::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid role '{}'. Expected 'client' or 'freelancer'.",
                    raw
                ))
            }),
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 password hash. Never serialized.
    pub password: String,
    pub role: Option<String>,
    /// Legacy column written by older clients; read through `Role::reconcile`.
    pub account_type: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub location: String,
    pub avatar: Option<String>,
    pub rating: f64,
    pub review_count: i32,
    pub completed_orders: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::reconcile(self.role.as_deref(), self.account_type.as_deref())
    }

    /// Profile as seen by its owner.
    pub fn into_private(self) -> UserResponse {
        let email = Some(self.email.clone());
        UserResponse { email, ..self.into_public() }
    }

    /// Profile as seen by anyone else: no email.
    pub fn into_public(self) -> UserResponse {
        let role = self.role();
        UserResponse {
            id: self.id,
            name: self.name,
            email: None,
            role,
            profile: ProfileResponse {
                bio: self.bio,
                skills: self.skills,
                hourly_rate: self.hourly_rate,
                location: self.location,
                avatar: self.avatar,
                rating: self.rating,
                review_count: self.review_count,
                completed_orders: self.completed_orders,
            },
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub profile: ProfileResponse,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub bio: String,
    pub skills: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub location: String,
    pub avatar: Option<String>,
    pub rating: f64,
    pub review_count: i32,
    pub completed_orders: i32,
}

/// Display-ready party summary embedded in orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// DTO for creating a new user (Registration).
/// `role` and the legacy `accountType` are both accepted.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ), custom(function = crate::models::validate_not_blank))]
    pub name: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
    pub role: Option<String>,
    #[serde(alias = "account_type")]
    pub account_type: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for a self-service profile update. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100), custom(function = crate::models::validate_not_blank))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 50), custom(function = validate_skills))]
    pub skills: Option<Vec<String>>,
    #[validate(range(min = 0.0, message = "Hourly rate cannot be negative."))]
    pub hourly_rate: Option<f64>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 500), custom(function = crate::models::validate_url_string))]
    pub avatar: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.bio.is_none()
            && self.skills.is_none()
            && self.hourly_rate.is_none()
            && self.location.is_none()
            && self.avatar.is_none()
    }
}

fn validate_skills(skills: &[String]) -> Result<(), validator::ValidationError> {
    if skills.iter().any(|s| s.trim().is_empty() || s.len() > 50) {
        return Err(validator::ValidationError::new("invalid_skill"));
    }
    Ok(())
}
