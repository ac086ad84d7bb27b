//! Lending state machine: borrow, return, fine payment and overdue sweep.
//!
//! Each mutation is one unit of work on the [`LendingStore`]. Eligibility
//! is decided inside that unit, under the same row locks the mutation uses,
//! so two concurrent borrows cannot both consume the last copy or push a
//! member past the loan cap.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::{
    eligibility::{self, Eligibility},
    suspension,
};
use crate::{
    clock::Clock,
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{Fine, ItemStatus, Loan, LoanStatus, MemberStatus, NewFine, NewLoan},
    repository::LendingStore,
};

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Active loans found past due when the pass started
    pub examined: usize,
    /// Loans this pass moved to `overdue`
    pub reclassified: Vec<i32>,
    /// Members this pass suspended
    pub suspended: Vec<i32>,
}

/// Result of closing a loan
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: Loan,
    pub fine: Option<Fine>,
    pub member_status: Option<MemberStatus>,
}

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn LendingStore>,
    config: LendingConfig,
    clock: Arc<dyn Clock>,
}

impl LendingService {
    pub fn new(store: Arc<dyn LendingStore>, config: LendingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Read-only eligibility check. The unit of work is dropped, never committed.
    pub async fn check_eligibility(&self, item_id: i32, member_id: i32) -> AppResult<Eligibility> {
        let mut tx = self.store.begin().await?;
        let (_, _, eligibility) =
            eligibility::evaluate(tx.as_mut(), item_id, member_id, self.config.max_loans_per_member)
                .await?;
        Ok(eligibility)
    }

    /// Borrow one copy of an item
    pub async fn borrow(&self, item_id: i32, member_id: i32) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        let (item, _member, eligibility) =
            eligibility::evaluate(tx.as_mut(), item_id, member_id, self.config.max_loans_per_member)
                .await?;

        if let Eligibility::Denied(reason) = eligibility {
            tracing::warn!(item_id, member_id, %reason, "Borrow denied");
            return Err(AppError::PolicyViolation(reason.to_string()));
        }

        let now = self.clock.now();
        let loan = tx
            .insert_loan(&NewLoan::open(item_id, member_id, now, self.config.loan_period()))
            .await?;

        let remaining = item.available_copies - 1;
        tx.set_item_availability(item_id, remaining, item.derived_status(remaining))
            .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            item_id,
            member_id,
            due_date = %loan.due_date,
            "Item borrowed"
        );
        Ok(loan)
    }

    /// Close a loan, restore the copy, fine a late return and re-evaluate
    /// the member's overdue standing
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<ReturnOutcome> {
        let mut tx = self.store.begin().await?;

        let loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        if loan.status == LoanStatus::Returned {
            return Err(AppError::InvalidState("already returned".to_string()));
        }

        let item = tx.lock_item(loan.item_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Item with id {} not found", loan.item_id))
        })?;

        if item.available_copies >= item.total_copies {
            return Err(AppError::Internal(format!(
                "Item {} reports all copies on the shelf while loan {} is open",
                item.id, loan.id
            )));
        }

        let now = self.clock.now();
        let closed = tx.close_loan(loan_id, now).await?;

        // Return always puts the copy back on the shelf, even over an admin
        // reserved/maintenance status.
        tx.set_item_availability(item.id, item.available_copies + 1, ItemStatus::Available)
            .await?;

        let fine = match NewFine::for_late_return(&loan, now, self.config.fine_per_day) {
            Some(new_fine) => Some(tx.insert_fine(&new_fine).await?),
            None => None,
        };

        let member_status = suspension::apply_overdue_rule(
            tx.as_mut(),
            loan.member_id,
            self.config.max_overdue_for_suspension,
        )
        .await?;

        tx.commit().await?;

        match &fine {
            Some(f) => tracing::info!(loan_id, fine_id = f.id, amount = %f.amount, "Late return fined"),
            None => tracing::info!(loan_id, "Item returned"),
        }

        Ok(ReturnOutcome {
            loan: closed,
            fine,
            member_status,
        })
    }

    /// Settle a fine
    pub async fn pay_fine(&self, fine_id: i32) -> AppResult<Fine> {
        let mut tx = self.store.begin().await?;

        let fine = tx
            .lock_fine(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))?;

        if fine.is_paid() {
            return Err(AppError::InvalidState("already paid".to_string()));
        }

        let paid = tx.mark_fine_paid(fine_id, self.clock.now()).await?;

        suspension::apply_unpaid_fine_rule(
            tx.as_mut(),
            fine.member_id,
            self.config.max_overdue_for_suspension,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(fine_id, member_id = fine.member_id, amount = %fine.amount, "Fine paid");
        Ok(paid)
    }

    /// Reclassify active loans past their due date. Each loan is its own
    /// unit of work and is re-checked under lock, so repeated or concurrent
    /// passes converge on the same state.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let now = self.clock.now();
        let candidates = self.store.active_loans_due_before(now).await?;

        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for loan_id in candidates {
            let mut tx = self.store.begin().await?;

            let loan = match tx.lock_loan(loan_id).await? {
                Some(loan) if loan.is_past_due(now) => loan,
                // Returned or reclassified by someone else since the scan
                _ => continue,
            };

            tx.mark_loan_overdue(loan_id).await?;
            let changed = suspension::apply_overdue_rule(
                tx.as_mut(),
                loan.member_id,
                self.config.max_overdue_for_suspension,
            )
            .await?;

            tx.commit().await?;

            report.reclassified.push(loan_id);
            if changed == Some(MemberStatus::Suspended) {
                report.suspended.push(loan.member_id);
            }
        }

        tracing::debug!(
            examined = report.examined,
            reclassified = report.reclassified.len(),
            suspended = report.suspended.len(),
            "Overdue sweep finished"
        );
        Ok(report)
    }

    /// Get loan by ID
    pub async fn get_loan(&self, loan_id: i32) -> AppResult<Loan> {
        self.store
            .loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    /// Every loan of a member, newest first
    pub async fn member_loans(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        self.store.member_loans(member_id).await
    }

    /// Overdue loans. Sweeps first so the listing is never stale.
    pub async fn overdue_loans(&self) -> AppResult<Vec<Loan>> {
        self.sweep().await?;
        self.store.overdue_loans().await
    }
}
