//! Fine endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::fine::{Fine, FineQuery},
    repository::paging,
};

/// Page of fines with the library-wide outstanding amount
#[derive(Serialize, ToSchema)]
pub struct FinesPage {
    pub items: Vec<Fine>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    /// Sum of every unpaid fine, not just this page
    pub total_unpaid: Decimal,
}

/// List fines
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    params(FineQuery),
    responses(
        (status = 200, description = "List of fines", body = FinesPage)
    )
)]
pub async fn list_fines(
    State(state): State<crate::AppState>,
    Query(query): Query<FineQuery>,
) -> AppResult<Json<FinesPage>> {
    let (items, total, total_unpaid) = state.services.fines.search_fines(&query).await?;
    let (page, per_page, _) = paging(query.page, query.per_page);

    Ok(Json(FinesPage {
        items,
        total,
        page,
        per_page,
        total_unpaid,
    }))
}

/// Get fine by ID
#[utoipa::path(
    get,
    path = "/fines/{id}",
    tag = "fines",
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine", body = Fine),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn get_fine(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.get_fine(id).await?;
    Ok(Json(fine))
}

/// Pay a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.lending.pay_fine(id).await?;
    Ok(Json(fine))
}
