//! Member suspension rules.
//!
//! Two triggers, evaluated at different points and always inside the
//! caller's unit of work:
//! - overdue count, after a return or an overdue reclassification;
//! - unpaid fines, after a fine payment.

use crate::{
    error::{AppError, AppResult},
    models::{Member, MemberStatus},
    repository::LendingTx,
};

/// Status change implied by the member's overdue-loan count, if any
pub fn overdue_transition(current: MemberStatus, overdue_loans: i64, threshold: i64) -> Option<MemberStatus> {
    match current {
        MemberStatus::Active if overdue_loans >= threshold => Some(MemberStatus::Suspended),
        MemberStatus::Suspended if overdue_loans < threshold => Some(MemberStatus::Active),
        _ => None,
    }
}

/// Status change after a fine payment. Clearing every unpaid fine lifts a
/// suspension only while the overdue trigger is not holding it.
pub fn fine_payment_transition(
    current: MemberStatus,
    unpaid_fines: i64,
    overdue_loans: i64,
    threshold: i64,
) -> Option<MemberStatus> {
    if current == MemberStatus::Suspended && unpaid_fines == 0 && overdue_loans < threshold {
        Some(MemberStatus::Active)
    } else {
        None
    }
}

async fn lock_member(tx: &mut dyn LendingTx, member_id: i32) -> AppResult<Member> {
    tx.lock_member(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))
}

/// Re-evaluate the overdue trigger. Returns the new status when it changed.
pub async fn apply_overdue_rule(
    tx: &mut dyn LendingTx,
    member_id: i32,
    threshold: i64,
) -> AppResult<Option<MemberStatus>> {
    let member = lock_member(tx, member_id).await?;
    let overdue = tx.count_overdue_loans(member_id).await?;

    match overdue_transition(member.status, overdue, threshold) {
        Some(status) => {
            tx.set_member_status(member_id, status).await?;
            tracing::info!(member_id, overdue, %status, "Member status changed by overdue rule");
            Ok(Some(status))
        }
        None => Ok(None),
    }
}

/// Re-evaluate after a fine payment. Returns the new status when it changed.
pub async fn apply_unpaid_fine_rule(
    tx: &mut dyn LendingTx,
    member_id: i32,
    threshold: i64,
) -> AppResult<Option<MemberStatus>> {
    let member = lock_member(tx, member_id).await?;
    if !member.is_suspended() {
        return Ok(None);
    }

    let unpaid = tx.count_unpaid_fines(member_id).await?;
    let overdue = tx.count_overdue_loans(member_id).await?;

    match fine_payment_transition(member.status, unpaid, overdue, threshold) {
        Some(status) => {
            tx.set_member_status(member_id, status).await?;
            tracing::info!(member_id, %status, "Member reactivated after clearing fines");
            Ok(Some(status))
        }
        None => {
            tracing::debug!(member_id, unpaid, overdue, "Member stays suspended after fine payment");
            Ok(None)
        }
    }
}
