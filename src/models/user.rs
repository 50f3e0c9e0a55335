// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate::validate_slug;

/// Platform roles. Stored as lowercase text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Learner,
    OrgAdmin,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::OrgAdmin => "org_admin",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "learner" => Some(Role::Learner),
            "org_admin" => Some(Role::OrgAdmin),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash. Never serialized.
    #[serde(skip)]
    pub password: String,

    pub display_name: String,

    /// 'learner', 'org_admin' or 'admin'.
    pub role: String,

    pub organization_id: Option<i64>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'organizations' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
}

/// DTO for login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for admins changing a user's role or organization.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    /// `Some(None)` detaches the user from its organization.
    #[serde(default, with = "double_option")]
    pub organization_id: Option<Option<i64>>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 100), custom(function = validate_slug))]
    pub slug: String,
}

/// Distinguishes a missing field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Learner, Role::OrgAdmin, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("instructor"), None);
    }

    #[test]
    fn test_update_user_null_vs_missing_org() {
        let detach: UpdateUserRequest =
            serde_json::from_str(r#"{"organization_id": null}"#).unwrap();
        assert_eq!(detach.organization_id, Some(None));

        let untouched: UpdateUserRequest = serde_json::from_str(r#"{"role": "admin"}"#).unwrap();
        assert_eq!(untouched.organization_id, None);
        assert_eq!(untouched.role, Some(Role::Admin));
    }

    #[test]
    fn test_register_rejects_short_password() {
        let req = RegisterRequest {
            username: "alice".into(),
            password: "short".into(),
            display_name: None,
        };
        assert!(req.validate().is_err());
    }
}
