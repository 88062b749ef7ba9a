//! Staff API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{require_text, success, ApiResponse, ApiResult};
use crate::auth::CompanyId;
use crate::errors::AppError;
use crate::models::{
    CreateStaffRequest, DeleteMode, DeleteStaffParams, StaffMember, UpdateStaffRequest,
};
use crate::AppState;

/// GET /api/staff - List active (not deleted) staff.
pub async fn list_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
) -> ApiResult<Vec<StaffMember>> {
    success(state.repo.list_staff(&company, false).await?)
}

/// GET /api/staff/deleted - List soft-deleted staff.
pub async fn list_deleted_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
) -> ApiResult<Vec<StaffMember>> {
    success(state.repo.list_staff(&company, true).await?)
}

/// GET /api/staff/:id - Get a single staff member.
pub async fn get_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
) -> ApiResult<StaffMember> {
    match state.repo.get_staff(&company, &id).await? {
        Some(member) => success(member),
        None => Err(AppError::NotFound(format!("Staff member {} not found", id))),
    }
}

/// POST /api/staff - Create a staff member.
pub async fn create_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Json(request): Json<CreateStaffRequest>,
) -> ApiResult<StaffMember> {
    require_text(&request.name, "Name")?;
    require_text(&request.role, "Role")?;

    let member = state.repo.create_staff(&company, &request).await?;
    Ok(ApiResponse::new(member).with_message("Staff member created"))
}

/// PUT /api/staff/:id - Update a staff member.
pub async fn update_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
    Json(request): Json<UpdateStaffRequest>,
) -> ApiResult<StaffMember> {
    if let Some(name) = &request.name {
        require_text(name, "Name")?;
    }

    let member = state.repo.update_staff(&company, &id, &request).await?;
    Ok(ApiResponse::new(member).with_message("Staff member updated"))
}

/// DELETE /api/staff/:id?mode=soft|hard - Delete a staff member.
///
/// Soft deletion answers with the flagged record, hard deletion with `null`.
pub async fn delete_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
    Query(params): Query<DeleteStaffParams>,
) -> ApiResult<Option<StaffMember>> {
    match params.mode {
        DeleteMode::Soft => {
            let member = state
                .repo
                .soft_delete_staff(&company, &id, params.reason, params.deleted_by)
                .await?;
            tracing::info!(company = %company, staff_id = %id, "Staff member soft-deleted");
            Ok(ApiResponse::new(Some(member)).with_message("Staff member moved to deleted"))
        }
        DeleteMode::Hard => {
            state.repo.hard_delete_staff(&company, &id).await?;
            tracing::info!(company = %company, staff_id = %id, "Staff member permanently deleted");
            Ok(ApiResponse::new(None).with_message("Staff member permanently deleted"))
        }
    }
}

/// POST /api/staff/:id/restore - Reverse a soft delete.
pub async fn restore_staff(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
) -> ApiResult<StaffMember> {
    let member = state.repo.restore_staff(&company, &id).await?;
    tracing::info!(company = %company, staff_id = %id, "Staff member restored");
    Ok(ApiResponse::new(member).with_message("Staff member restored"))
}
