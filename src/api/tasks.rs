//! Task API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use super::{require_text, success, ApiResponse, ApiResult};
use crate::auth::CompanyId;
use crate::errors::AppError;
use crate::models::{
    AddNoteRequest, BulkAssignRequest, BulkAssignResult, CreateTaskRequest, Task,
    TaskListParams, TaskStatistics, UpdateProgressRequest, UpdateStatusRequest,
    UpdateTaskRequest,
};
use crate::AppState;

fn check_progress(progress: u8) -> Result<(), AppError> {
    if progress > 100 {
        return Err(AppError::Validation(format!(
            "Progress must be between 0 and 100, got {}",
            progress
        )));
    }
    Ok(())
}

/// GET /api/tasks - List tasks, optionally filtered by status, priority, assignee or type.
pub async fn list_tasks(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Query(params): Query<TaskListParams>,
) -> ApiResult<Vec<Task>> {
    success(state.repo.list_tasks(&company, &params).await?)
}

/// GET /api/tasks/:id - Get a single task.
pub async fn get_task(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
) -> ApiResult<Task> {
    match state.repo.get_task(&company, &id).await? {
        Some(task) => success(task),
        None => Err(AppError::NotFound(format!("Task {} not found", id))),
    }
}

/// POST /api/tasks - Create a task.
pub async fn create_task(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    require_text(&request.title, "Title")?;
    require_text(&request.assigned_to, "Assignee (assignedTo)")?;
    require_text(&request.task_type, "Task type")?;
    check_progress(request.progress)?;

    let task = state.repo.create_task(&company, &request).await?;
    Ok(ApiResponse::new(task).with_message("Task created"))
}

/// PUT /api/tasks/:id - Update a task.
pub async fn update_task(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    if let Some(title) = &request.title {
        require_text(title, "Title")?;
    }
    if let Some(progress) = request.progress {
        check_progress(progress)?;
    }

    let task = state.repo.update_task(&company, &id, &request).await?;
    Ok(ApiResponse::new(task).with_message("Task updated"))
}

/// DELETE /api/tasks/:id - Delete a task.
pub async fn delete_task(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_task(&company, &id).await?;
    Ok(ApiResponse::new(()).with_message("Task deleted"))
}

/// PATCH /api/tasks/:id/status - Move a task to a new status.
pub async fn update_task_status(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Task> {
    let task = state
        .repo
        .set_task_status(&company, &id, request.status)
        .await?;
    success(task)
}

/// PATCH /api/tasks/:id/progress - Record task progress.
pub async fn update_task_progress(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
    Json(request): Json<UpdateProgressRequest>,
) -> ApiResult<Task> {
    check_progress(request.progress)?;
    let task = state
        .repo
        .set_task_progress(&company, &id, request.progress)
        .await?;
    success(task)
}

/// POST /api/tasks/:id/notes - Append a note.
pub async fn add_task_note(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Path(id): Path<String>,
    Json(request): Json<AddNoteRequest>,
) -> ApiResult<Task> {
    require_text(&request.text, "Note text")?;
    let task = state.repo.add_task_note(&company, &id, &request).await?;
    success(task)
}

/// GET /api/tasks/statistics - Aggregate counters.
pub async fn task_statistics(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
) -> ApiResult<TaskStatistics> {
    success(state.repo.task_statistics(&company, Utc::now()).await?)
}

/// POST /api/tasks/bulk-assign - Reassign many tasks at once.
pub async fn bulk_assign_tasks(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
    Json(request): Json<BulkAssignRequest>,
) -> ApiResult<BulkAssignResult> {
    if request.task_ids.is_empty() {
        return Err(AppError::Validation("No task ids provided".to_string()));
    }
    require_text(&request.assigned_to, "Assignee (assignedTo)")?;

    let result = state
        .repo
        .bulk_assign_tasks(&company, &request.task_ids, &request.assigned_to)
        .await?;
    if !result.missing.is_empty() {
        tracing::warn!(
            company = %company,
            missing = result.missing.len(),
            "Bulk assign skipped unknown tasks"
        );
    }
    let message = format!("{} task(s) reassigned", result.updated.len());
    Ok(ApiResponse::new(result).with_message(message))
}

/// GET /api/tasks/today - Tasks due today (UTC).
pub async fn tasks_due_today(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
) -> ApiResult<Vec<Task>> {
    success(state.repo.tasks_due_today(&company, Utc::now()).await?)
}

/// GET /api/tasks/overdue - Open tasks past their due date.
pub async fn overdue_tasks(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
) -> ApiResult<Vec<Task>> {
    success(state.repo.overdue_tasks(&company, Utc::now()).await?)
}

/// GET /api/tasks/reminders - Tasks whose reminder fires within the next day.
pub async fn task_reminders(
    State(state): State<AppState>,
    CompanyId(company): CompanyId,
) -> ApiResult<Vec<Task>> {
    success(state.repo.upcoming_reminders(&company, Utc::now()).await?)
}
