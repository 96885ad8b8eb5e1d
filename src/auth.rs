/// Authenticated principal and its HTTP extractor
///
/// Credential checks happen upstream; by the time a request reaches this
/// service the gateway has put the caller's user id into `x-principal-id`.
use crate::{
    context::AppContext,
    error::{WorkflowError, WorkflowResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Header carrying the authenticated user id
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Platform roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            _ => Err(WorkflowError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Stored user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
}

impl NewUser {
    pub fn into_record(self) -> WorkflowResult<UserRecord> {
        let normalized = NewUser {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            role: self.role,
            department: normalize_department(self.department.as_deref()),
        };
        normalized.validate()?;

        Ok(UserRecord {
            id: Uuid::new_v4(),
            name: normalized.name,
            email: normalized.email,
            role: normalized.role,
            department: normalized.department,
            created_at: Utc::now(),
        })
    }
}

/// Empty or whitespace-only departments mean "no department"
pub fn normalize_department(department: Option<&str>) -> Option<String> {
    department
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// The caller of a workflow operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub department: Option<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with Forbidden unless the principal holds the admin role
    pub fn require_admin(&self) -> WorkflowResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden("Admin access required".to_string()))
        }
    }
}

impl From<&UserRecord> for Principal {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            department: user.department.clone(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for Principal {
    type Rejection = WorkflowError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| WorkflowError::Validation("Missing principal header".to_string()))?;

        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| WorkflowError::Validation("Malformed principal id".to_string()))?;

        state.orchestrator.principal(user_id).await
    }
}
