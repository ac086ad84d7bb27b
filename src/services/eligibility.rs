//! Borrow eligibility.
//!
//! [`check`] is a pure decision over data already read (and locked) by the
//! caller's unit of work. [`evaluate`] gathers that data inside an open
//! [`LendingTx`] so the decision and the mutation that follows it see the
//! same rows.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{Item, ItemStatus, Member},
    repository::LendingTx,
};

/// Counts about a member that the rules depend on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberStanding {
    /// Active + overdue loans
    pub open_loans: i64,
    pub unpaid_fines: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    ItemNotAvailable(ItemStatus),
    NoCopiesAvailable,
    MemberSuspended,
    LoanLimitExceeded,
    UnpaidFines,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::ItemNotAvailable(status) => write!(f, "item is {}", status),
            DenialReason::NoCopiesAvailable => f.write_str("no copies available"),
            DenialReason::MemberSuspended => f.write_str("member suspended"),
            DenialReason::LoanLimitExceeded => f.write_str("loan limit exceeded"),
            DenialReason::UnpaidFines => f.write_str("unpaid fines outstanding"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(DenialReason),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Eligibility::Allowed => Ok(()),
            Eligibility::Denied(reason) => Err(AppError::PolicyViolation(reason.to_string())),
        }
    }
}

/// Eligibility check result for the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EligibilityReport {
    pub item_id: i32,
    pub member_id: i32,
    pub allowed: bool,
    pub reason: Option<String>,
}

impl EligibilityReport {
    pub fn new(item_id: i32, member_id: i32, eligibility: Eligibility) -> Self {
        let reason = match eligibility {
            Eligibility::Allowed => None,
            Eligibility::Denied(reason) => Some(reason.to_string()),
        };
        Self {
            item_id,
            member_id,
            allowed: eligibility.is_allowed(),
            reason,
        }
    }
}

/// Apply the borrow rules in order; the first failing rule wins
pub fn check(item: &Item, member: &Member, standing: MemberStanding, max_loans_per_member: i64) -> Eligibility {
    if item.status != ItemStatus::Available {
        return Eligibility::Denied(DenialReason::ItemNotAvailable(item.status));
    }
    if item.available_copies <= 0 {
        return Eligibility::Denied(DenialReason::NoCopiesAvailable);
    }
    if member.is_suspended() {
        return Eligibility::Denied(DenialReason::MemberSuspended);
    }
    if standing.open_loans >= max_loans_per_member {
        return Eligibility::Denied(DenialReason::LoanLimitExceeded);
    }
    if standing.unpaid_fines > 0 {
        return Eligibility::Denied(DenialReason::UnpaidFines);
    }
    Eligibility::Allowed
}

/// Lock the item, then the member, and decide. Missing records are
/// `NotFound`; every other outcome is returned as [`Eligibility`].
pub async fn evaluate(
    tx: &mut dyn LendingTx,
    item_id: i32,
    member_id: i32,
    max_loans_per_member: i64,
) -> AppResult<(Item, Member, Eligibility)> {
    let item = tx
        .lock_item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", item_id)))?;
    let member = tx
        .lock_member(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))?;

    let standing = MemberStanding {
        open_loans: tx.count_open_loans(member_id).await?,
        unpaid_fines: tx.count_unpaid_fines(member_id).await?,
    };

    let eligibility = check(&item, &member, standing, max_loans_per_member);
    Ok((item, member, eligibility))
}
