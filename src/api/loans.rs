//! Loan endpoints: borrow, return, listings and the overdue sweep

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use super::PaginatedResponse;
use crate::{
    error::AppResult,
    models::loan::{BorrowRequest, Loan, LoanQuery},
    services::{
        eligibility::EligibilityReport,
        lending::{ReturnOutcome, SweepReport},
    },
};

/// Borrow an item
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Item or member not found"),
        (status = 422, description = "Borrowing not allowed")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    request.validate()?;
    let loan = state
        .services
        .lending
        .borrow(request.item_id, request.member_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Check whether a member may borrow an item, without borrowing it
#[utoipa::path(
    get,
    path = "/loans/eligibility",
    tag = "loans",
    params(BorrowRequest),
    responses(
        (status = 200, description = "Eligibility decision", body = EligibilityReport),
        (status = 404, description = "Item or member not found")
    )
)]
pub async fn check_eligibility(
    State(state): State<crate::AppState>,
    Query(request): Query<BorrowRequest>,
) -> AppResult<Json<EligibilityReport>> {
    request.validate()?;
    let eligibility = state
        .services
        .lending
        .check_eligibility(request.item_id, request.member_id)
        .await?;
    Ok(Json(EligibilityReport::new(request.item_id, request.member_id, eligibility)))
}

/// List loans with filters and pagination
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "List of loans", body = PaginatedResponse<Loan>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<Loan>>> {
    let (loans, total) = state.services.loans.search(&query).await?;
    Ok(Json(PaginatedResponse::new(loans, total, query.page, query.per_page)))
}

/// Overdue loans, oldest due date first
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans", body = Vec<Loan>)
    )
)]
pub async fn list_overdue_loans(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.lending.overdue_loans().await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.lending.get_loan(loan_id).await?;
    Ok(Json(loan))
}

/// Return a borrowed item
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Item returned", body = ReturnOutcome),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<ReturnOutcome>> {
    let outcome = state.services.lending.return_loan(loan_id).await?;
    Ok(Json(outcome))
}

/// Run an overdue sweep now
#[utoipa::path(
    post,
    path = "/admin/sweep",
    tag = "loans",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport)
    )
)]
pub async fn run_sweep(State(state): State<crate::AppState>) -> AppResult<Json<SweepReport>> {
    let report = state.services.lending.sweep().await?;
    Ok(Json(report))
}
