//! Fine model and late-return fine computation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::loan::Loan;

const SECONDS_PER_DAY: i64 = 86_400;

/// Fine record. One per loan at most; the amount never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub loan_id: i32,
    pub member_id: i32,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Fine {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

/// Whole days late, counting any started day as a full one
pub fn overdue_days(due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
    let late = (returned_at - due_date).num_seconds();
    if late <= 0 {
        0
    } else {
        (late + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    }
}

/// A fine about to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewFine {
    pub loan_id: i32,
    pub member_id: i32,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl NewFine {
    /// Fine owed for closing `loan` at `returned_at`, or `None` when on time
    pub fn for_late_return(loan: &Loan, returned_at: DateTime<Utc>, fine_per_day: Decimal) -> Option<Self> {
        if returned_at <= loan.due_date {
            return None;
        }
        let days = overdue_days(loan.due_date, returned_at);
        Some(Self {
            loan_id: loan.id,
            member_id: loan.member_id,
            amount: Decimal::from(days) * fine_per_day,
            created_at: returned_at,
        })
    }
}

/// Fine query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct FineQuery {
    pub paid: Option<bool>,
    pub member_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
