//! Unit-of-work seam used by the lending state machine.
//!
//! Every borrow, return, fine payment and per-loan sweep step runs inside a
//! single [`LendingTx`]. Locking reads hold their row until the unit commits
//! or is dropped; dropping without [`LendingTx::commit`] rolls back.
//!
//! Lock order is loan/fine, then item, then member. Implementations rely on
//! callers respecting it so that concurrent units cannot deadlock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{Fine, Item, ItemStatus, Loan, Member, MemberStatus, NewFine, NewLoan},
};

#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Open an atomic unit of work
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>>;

    async fn loan(&self, id: i32) -> AppResult<Option<Loan>>;

    /// All loans of a member, newest first
    async fn member_loans(&self, member_id: i32) -> AppResult<Vec<Loan>>;

    /// Loans currently classified overdue, oldest due date first
    async fn overdue_loans(&self) -> AppResult<Vec<Loan>>;

    /// Ids of `active` loans whose due date is before `now`. Unlocked
    /// snapshot; the sweep re-checks each loan under lock.
    async fn active_loans_due_before(&self, now: DateTime<Utc>) -> AppResult<Vec<i32>>;
}

#[async_trait]
pub trait LendingTx: Send {
    async fn lock_item(&mut self, id: i32) -> AppResult<Option<Item>>;

    async fn lock_member(&mut self, id: i32) -> AppResult<Option<Member>>;

    async fn lock_loan(&mut self, id: i32) -> AppResult<Option<Loan>>;

    async fn lock_fine(&mut self, id: i32) -> AppResult<Option<Fine>>;

    /// Active + overdue loans held by the member
    async fn count_open_loans(&mut self, member_id: i32) -> AppResult<i64>;

    async fn count_overdue_loans(&mut self, member_id: i32) -> AppResult<i64>;

    async fn count_unpaid_fines(&mut self, member_id: i32) -> AppResult<i64>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    async fn set_item_availability(
        &mut self,
        item_id: i32,
        available_copies: i32,
        status: ItemStatus,
    ) -> AppResult<Item>;

    async fn close_loan(&mut self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan>;

    async fn mark_loan_overdue(&mut self, loan_id: i32) -> AppResult<Loan>;

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine>;

    async fn mark_fine_paid(&mut self, fine_id: i32, paid_at: DateTime<Utc>) -> AppResult<Fine>;

    async fn set_member_status(&mut self, member_id: i32, status: MemberStatus) -> AppResult<Member>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
