//! Loan (borrow) model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Loan lifecycle. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }

    /// Active and overdue loans both hold a copy
    pub fn is_open(&self) -> bool {
        !matches!(self, LoanStatus::Returned)
    }
}

/// Loan record. Never deleted: the table is the circulation audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub item_id: i32,
    pub member_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

impl Loan {
    /// Whether the loan is still out and `now` is past its due date
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && self.due_date < now
    }
}

/// A loan about to be persisted. Derived fields are fixed here, once.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub item_id: i32,
    pub member_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewLoan {
    pub fn open(item_id: i32, member_id: i32, now: DateTime<Utc>, loan_period: Duration) -> Self {
        Self {
            item_id,
            member_id,
            borrowed_at: now,
            due_date: now + loan_period,
        }
    }
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema, IntoParams)]
pub struct BorrowRequest {
    #[validate(range(min = 1, message = "item_id must be positive"))]
    pub item_id: i32,
    #[validate(range(min = 1, message = "member_id must be positive"))]
    pub member_id: i32,
}

/// Loan query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub member_id: Option<i32>,
    pub item_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
