//! In-process lending store.
//!
//! Units of work are serialised behind one async mutex: `begin` takes the
//! lock and works on a copy of the state, `commit` swaps the copy in and
//! dropping the unit discards it. The same range and uniqueness rules as
//! the SQL schema are enforced on write.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::{LendingStore, LendingTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        item::CreateItem,
        member::{generate_membership_number, CreateMember},
        Fine, Item, ItemStatus, Loan, LoanStatus, Member,
        MemberStatus, NewFine, NewLoan,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    items: BTreeMap<i32, Item>,
    members: BTreeMap<i32, Member>,
    loans: BTreeMap<i32, Loan>,
    fines: BTreeMap<i32, Fine>,
    last_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn item_mut(&mut self, id: i32) -> AppResult<&mut Item> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    fn member_mut(&mut self, id: i32) -> AppResult<&mut Member> {
        self.members
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    fn loan_mut(&mut self, id: i32) -> AppResult<&mut Loan> {
        self.loans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }
}

#[derive(Clone, Default)]
pub struct MemoryLendingStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item, applying the same copy rules as the catalog
    pub async fn add_item(&self, data: CreateItem) -> AppResult<Item> {
        let (total_copies, available_copies) = data.copies()?;
        let status = data.initial_status()?;
        let mut state = self.state.lock().await;
        if state.items.values().any(|i| i.isbn == data.isbn) {
            return Err(AppError::Validation("isbn must be unique".to_string()));
        }
        let now = Utc::now();
        let item = Item {
            id: state.next_id(),
            isbn: data.isbn,
            title: data.title,
            author: data.author,
            category: data.category,
            status,
            total_copies,
            available_copies,
            created_at: now,
            updated_at: now,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    /// Register a member, generating a membership number when none is given
    pub async fn add_member(&self, data: CreateMember) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        if state.members.values().any(|m| m.email == data.email) {
            return Err(AppError::Validation("email must be unique".to_string()));
        }
        let id = state.next_id();
        let membership_number = data
            .membership_number
            .unwrap_or_else(generate_membership_number);
        if state
            .members
            .values()
            .any(|m| m.membership_number == membership_number)
        {
            return Err(AppError::Validation(
                "membership_number must be unique".to_string(),
            ));
        }
        let now = Utc::now();
        let member = Member {
            id,
            name: data.name,
            email: data.email,
            membership_number,
            status: MemberStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.members.insert(member.id, member.clone());
        Ok(member)
    }

    /// Admin override of an item status, outside the lending rules
    pub async fn set_item_status(&self, id: i32, status: ItemStatus) -> AppResult<Item> {
        let mut state = self.state.lock().await;
        let item = state.item_mut(id)?;
        item.status = status;
        Ok(item.clone())
    }

    /// Admin override of a member status, outside the lending rules
    pub async fn set_member_status(&self, id: i32, status: MemberStatus) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        let member = state.member_mut(id)?;
        member.status = status;
        Ok(member.clone())
    }

    pub async fn item(&self, id: i32) -> Option<Item> {
        self.state.lock().await.items.get(&id).cloned()
    }

    pub async fn member(&self, id: i32) -> Option<Member> {
        self.state.lock().await.members.get(&id).cloned()
    }

    pub async fn fines(&self) -> Vec<Fine> {
        self.state.lock().await.fines.values().cloned().collect()
    }

    pub async fn loans(&self) -> Vec<Loan> {
        self.state.lock().await.loans.values().cloned().collect()
    }
}

#[async_trait]
impl LendingStore for MemoryLendingStore {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryLendingTx { guard, work }))
    }

    async fn loan(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.state.lock().await.loans.get(&id).cloned())
    }

    async fn member_loans(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.member_id == member_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id)));
        Ok(loans)
    }

    async fn overdue_loans(&self) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Overdue)
            .cloned()
            .collect();
        loans.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(loans)
    }

    async fn active_loans_due_before(&self, now: DateTime<Utc>) -> AppResult<Vec<i32>> {
        let state = self.state.lock().await;
        Ok(state
            .loans
            .values()
            .filter(|l| l.is_past_due(now))
            .map(|l| l.id)
            .collect())
    }
}

pub struct MemoryLendingTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl LendingTx for MemoryLendingTx {
    async fn lock_item(&mut self, id: i32) -> AppResult<Option<Item>> {
        Ok(self.work.items.get(&id).cloned())
    }

    async fn lock_member(&mut self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.work.members.get(&id).cloned())
    }

    async fn lock_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.work.loans.get(&id).cloned())
    }

    async fn lock_fine(&mut self, id: i32) -> AppResult<Option<Fine>> {
        Ok(self.work.fines.get(&id).cloned())
    }

    async fn count_open_loans(&mut self, member_id: i32) -> AppResult<i64> {
        Ok(self
            .work
            .loans
            .values()
            .filter(|l| l.member_id == member_id && l.status.is_open())
            .count() as i64)
    }

    async fn count_overdue_loans(&mut self, member_id: i32) -> AppResult<i64> {
        Ok(self
            .work
            .loans
            .values()
            .filter(|l| l.member_id == member_id && l.status == LoanStatus::Overdue)
            .count() as i64)
    }

    async fn count_unpaid_fines(&mut self, member_id: i32) -> AppResult<i64> {
        Ok(self
            .work
            .fines
            .values()
            .filter(|f| f.member_id == member_id && !f.is_paid())
            .count() as i64)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        if !self.work.items.contains_key(&loan.item_id) {
            return Err(AppError::NotFound(format!("Item with id {} not found", loan.item_id)));
        }
        if !self.work.members.contains_key(&loan.member_id) {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                loan.member_id
            )));
        }
        let created = Loan {
            id: self.work.next_id(),
            item_id: loan.item_id,
            member_id: loan.member_id,
            borrowed_at: loan.borrowed_at,
            due_date: loan.due_date,
            returned_at: None,
            status: LoanStatus::Active,
        };
        self.work.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_item_availability(
        &mut self,
        item_id: i32,
        available_copies: i32,
        status: ItemStatus,
    ) -> AppResult<Item> {
        let item = self.work.item_mut(item_id)?;
        if available_copies < 0 || available_copies > item.total_copies {
            return Err(AppError::Validation(
                "constraint items_available_copies_check violated".to_string(),
            ));
        }
        item.available_copies = available_copies;
        item.status = status;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn close_loan(&mut self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let loan = self.work.loan_mut(loan_id)?;
        loan.returned_at = Some(returned_at);
        loan.status = LoanStatus::Returned;
        Ok(loan.clone())
    }

    async fn mark_loan_overdue(&mut self, loan_id: i32) -> AppResult<Loan> {
        let loan = self.work.loan_mut(loan_id)?;
        loan.status = LoanStatus::Overdue;
        Ok(loan.clone())
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        if self.work.fines.values().any(|f| f.loan_id == fine.loan_id) {
            return Err(AppError::Validation("fines_loan_id_key must be unique".to_string()));
        }
        if fine.amount.is_sign_negative() {
            return Err(AppError::Validation(
                "constraint fines_amount_check violated".to_string(),
            ));
        }
        let created = Fine {
            id: self.work.next_id(),
            loan_id: fine.loan_id,
            member_id: fine.member_id,
            amount: fine.amount,
            paid_at: None,
            created_at: fine.created_at,
        };
        self.work.fines.insert(created.id, created.clone());
        Ok(created)
    }

    async fn mark_fine_paid(&mut self, fine_id: i32, paid_at: DateTime<Utc>) -> AppResult<Fine> {
        let fine = self
            .work
            .fines
            .get_mut(&fine_id)
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))?;
        fine.paid_at = Some(paid_at);
        Ok(fine.clone())
    }

    async fn set_member_status(&mut self, member_id: i32, status: MemberStatus) -> AppResult<Member> {
        let member = self.work.member_mut(member_id)?;
        member.status = status;
        member.updated_at = Utc::now();
        Ok(member.clone())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLendingTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
