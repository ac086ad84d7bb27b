//! Member management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::member::{
        generate_membership_number, CreateMember, Member, MemberFines, MemberQuery, UpdateMember,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn search_members(&self, query: &MemberQuery) -> AppResult<(Vec<Member>, i64)> {
        self.repository.members.search(query).await
    }

    pub async fn get_member(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    /// Register a member, generating a membership number when none is given
    pub async fn create_member(&self, data: CreateMember) -> AppResult<Member> {
        data.validate()?;
        let membership_number = data
            .membership_number
            .clone()
            .unwrap_or_else(generate_membership_number);

        let member = self.repository.members.create(&data, &membership_number).await?;
        tracing::info!(
            member_id = member.id,
            membership_number = %member.membership_number,
            "Member registered"
        );
        Ok(member)
    }

    /// Update contact fields. The membership number is immutable.
    pub async fn update_member(&self, id: i32, data: UpdateMember) -> AppResult<Member> {
        data.validate()?;
        let current = self.repository.members.get_by_id(id).await?;
        check_membership_number(&data, &current)?;
        self.repository.members.update(id, &data).await
    }

    /// Delete a member that has never borrowed
    pub async fn delete_member(&self, id: i32) -> AppResult<()> {
        self.repository.members.get_by_id(id).await?;
        let (total, open) = self.repository.members.loan_counts(id).await?;
        if open > 0 {
            return Err(AppError::InvalidState(
                "Cannot delete member with open loans".to_string(),
            ));
        }
        if total > 0 {
            return Err(AppError::InvalidState(
                "Cannot delete member with loan history".to_string(),
            ));
        }
        self.repository.members.delete(id).await
    }

    /// Unpaid fines of a member and their total
    pub async fn unpaid_fines(&self, id: i32) -> AppResult<MemberFines> {
        self.repository.members.get_by_id(id).await?;
        let fines = self.repository.fines.unpaid_for_member(id).await?;
        Ok(MemberFines::from_unpaid(id, fines))
    }
}

fn check_membership_number(data: &UpdateMember, current: &Member) -> AppResult<()> {
    match data.membership_number {
        Some(ref number) if *number != current.membership_number => Err(AppError::Validation(
            "Membership number cannot be changed".to_string(),
        )),
        _ => Ok(()),
    }
}
