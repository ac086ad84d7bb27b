//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{fines, health, items, loans, members};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "0.1.0",
        description = "Library circulation: catalog, members, loans and fines"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::list_available_items,
        items::get_item,
        items::create_item,
        items::update_item,
        items::update_item_status,
        items::delete_item,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        members::get_member_loans,
        members::get_member_fines,
        // Loans
        loans::create_loan,
        loans::check_eligibility,
        loans::list_loans,
        loans::list_overdue_loans,
        loans::get_loan,
        loans::return_loan,
        loans::run_sweep,
        // Fines
        fines::list_fines,
        fines::get_fine,
        fines::pay_fine,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::ItemStatus,
            crate::models::item::CreateItem,
            crate::models::item::UpdateItem,
            crate::models::item::UpdateItemStatus,
            // Members
            crate::models::member::Member,
            crate::models::member::MemberStatus,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            crate::models::member::MemberFines,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::BorrowRequest,
            crate::services::eligibility::EligibilityReport,
            crate::services::lending::ReturnOutcome,
            crate::services::lending::SweepReport,
            // Fines
            crate::models::fine::Fine,
            fines::FinesPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "items", description = "Catalog item management"),
        (name = "members", description = "Member management"),
        (name = "loans", description = "Borrowing, returns and overdue handling"),
        (name = "fines", description = "Late-return fines")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
