// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::validate_password_strength;

/// Role strings stored in the `users.role` column.
pub mod role {
    pub const STUDENT: &str = "student";
    pub const TUTOR: &str = "tutor";
    pub const ADMIN: &str = "admin";
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique email address.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'student', 'tutor' or 'admin'.
    pub role: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Insert payload for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Already hashed.
    pub password: String,
    pub role: String,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    #[validate(email(message = "Invalid email address."))]
    pub email: String,

    #[validate(
        length(
            min = 8,
            max = 128,
            message = "Password length must be between 8 and 128 characters."
        ),
        custom(function = validate_password_strength)
    )]
    pub password: String,

    /// Optional role selection. Only 'student' and 'tutor' are accepted at
    /// registration; admins are seeded from the environment.
    #[validate(custom(function = validate_signup_role))]
    pub role: Option<String>,
}

fn validate_signup_role(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        role::STUDENT | role::TUTOR => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_role")),
    }
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
