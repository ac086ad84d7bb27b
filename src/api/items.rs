//! Item (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::PaginatedResponse;
use crate::{
    error::AppResult,
    models::item::{CreateItem, Item, ItemQuery, UpdateItem, UpdateItemStatus},
};

/// Page selection
#[derive(Debug, Deserialize, IntoParams)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// List items with search and pagination
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(ItemQuery),
    responses(
        (status = 200, description = "List of items", body = PaginatedResponse<Item>)
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<PaginatedResponse<Item>>> {
    let (items, total) = state.services.catalog.search_items(&query).await?;
    Ok(Json(PaginatedResponse::new(items, total, query.page, query.per_page)))
}

/// List items that can be borrowed now
#[utoipa::path(
    get,
    path = "/items/available",
    tag = "items",
    params(PageParams),
    responses(
        (status = 200, description = "Borrowable items", body = PaginatedResponse<Item>)
    )
)]
pub async fn list_available_items(
    State(state): State<crate::AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<PaginatedResponse<Item>>> {
    let (items, total) = state
        .services
        .catalog
        .available_items(params.page, params.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(items, total, params.page, params.per_page)))
}

/// Get item details by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = Item),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// Create a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid input or duplicate ISBN")
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let created = state.services.catalog.create_item(data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing item
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(data): Json<UpdateItem>,
) -> AppResult<Json<Item>> {
    let updated = state.services.catalog.update_item(id, data).await?;
    Ok(Json(updated))
}

/// Override an item's status (available, reserved, maintenance)
#[utoipa::path(
    patch,
    path = "/items/{id}/status",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = UpdateItemStatus,
    responses(
        (status = 200, description = "Status updated", body = Item),
        (status = 400, description = "Status not allowed"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item_status(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(data): Json<UpdateItemStatus>,
) -> AppResult<Json<Item>> {
    let updated = state.services.catalog.set_status(id, data.status).await?;
    Ok(Json(updated))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Item has loans")
    )
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
