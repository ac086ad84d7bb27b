//! Member (borrower) model and related types

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::fine::Fine;

/// Member standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Suspended,
}

impl Default for MemberStatus {
    fn default() -> Self {
        MemberStatus::Active
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberStatus::Active => f.write_str("active"),
            MemberStatus::Suspended => f.write_str("suspended"),
        }
    }
}

/// Member record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub name: String,
    /// Contact address, unique
    pub email: String,
    /// Library card number, unique and immutable once set
    pub membership_number: String,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn is_suspended(&self) -> bool {
        self.status == MemberStatus::Suspended
    }
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Generated when absent
    #[validate(length(min = 1, message = "Membership number cannot be empty"))]
    pub membership_number: Option<String>,
}

/// Update member request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    /// Accepted only when equal to the stored value
    pub membership_number: Option<String>,
}

/// Member query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct MemberQuery {
    pub name: Option<String>,
    pub status: Option<MemberStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Outstanding fines of one member
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberFines {
    pub member_id: i32,
    pub count: usize,
    pub total: Decimal,
    pub fines: Vec<Fine>,
}

impl MemberFines {
    pub fn from_unpaid(member_id: i32, fines: Vec<Fine>) -> Self {
        let total = fines.iter().map(|f| f.amount).sum();
        Self {
            member_id,
            count: fines.len(),
            total,
            fines,
        }
    }
}

static MEMBERSHIP_SEQ: AtomicU32 = AtomicU32::new(0);

/// `M` + epoch millis + a 3-digit rolling sequence for same-millisecond registrations
pub fn generate_membership_number() -> String {
    let seq = MEMBERSHIP_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("M{}{:03}", Utc::now().timestamp_millis(), seq)
}
