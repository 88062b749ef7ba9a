//! Task endpoints, with cached reads.

use std::sync::Arc;

use super::cache::RequestCache;
use super::error::{ServiceError, ServiceResult};
use super::{resource_path, swallow_unauthorized, ApiClient};
use crate::models::{
    AddNoteRequest, BulkAssignRequest, BulkAssignResult, CreateTaskRequest, Task, TaskListParams,
    TaskStatistics, TaskStatus, UpdateProgressRequest, UpdateStatusRequest, UpdateTaskRequest,
};

/// Prefix shared by every cache key this service writes.
pub const TASK_CACHE_PREFIX: &str = "tasks.";

/// Task assignment operations against `/api/tasks`.
///
/// Reads go through a [`RequestCache`]; every write drops all cached task reads, whether
/// or not it succeeded.
#[derive(Clone)]
pub struct TaskService {
    client: ApiClient,
    cache: Arc<RequestCache>,
}

impl TaskService {
    pub fn new(client: ApiClient, cache: Arc<RequestCache>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    pub async fn create_task(&self, request: &CreateTaskRequest) -> ServiceResult<Task> {
        if request.title.trim().is_empty() {
            return Err(ServiceError::validation("Title is required"));
        }
        if request.assigned_to.trim().is_empty() {
            return Err(ServiceError::validation("Assignee is required"));
        }
        check_progress(request.progress)?;
        let result = self.client.post("/api/tasks", request).await;
        self.invalidate().await;
        result
    }

    /// Tasks matching the server-side filters. A rejected session yields an empty list.
    pub async fn get_all_tasks(&self, params: &TaskListParams) -> ServiceResult<Vec<Task>> {
        let result = self
            .cache
            .get_or_fetch("tasks.getAllTasks", params, || {
                self.client.get("/api/tasks", params)
            })
            .await;
        swallow_unauthorized("getAllTasks", result)
    }

    pub async fn get_task_by_id(&self, id: &str) -> ServiceResult<Task> {
        let path = task_path(id)?;
        self.cache
            .get_or_fetch("tasks.getTaskById", id, || self.client.get(&path, &()))
            .await
    }

    pub async fn update_task(&self, id: &str, request: &UpdateTaskRequest) -> ServiceResult<Task> {
        if let Some(progress) = request.progress {
            check_progress(progress)?;
        }
        let result = self.client.put(&task_path(id)?, request).await;
        self.invalidate().await;
        result
    }

    pub async fn delete_task(&self, id: &str) -> ServiceResult<()> {
        let result = self.client.delete(&task_path(id)?, &()).await;
        self.invalidate().await;
        result
    }

    pub async fn update_status(&self, id: &str, status: TaskStatus) -> ServiceResult<Task> {
        let path = format!("{}/status", task_path(id)?);
        let result = self
            .client
            .patch(&path, &UpdateStatusRequest { status })
            .await;
        self.invalidate().await;
        result
    }

    pub async fn update_progress(&self, id: &str, progress: u8) -> ServiceResult<Task> {
        check_progress(progress)?;
        let path = format!("{}/progress", task_path(id)?);
        let result = self
            .client
            .patch(&path, &UpdateProgressRequest { progress })
            .await;
        self.invalidate().await;
        result
    }

    pub async fn add_note(
        &self,
        id: &str,
        text: &str,
        author: Option<String>,
    ) -> ServiceResult<Task> {
        if text.trim().is_empty() {
            return Err(ServiceError::validation("Note text is required"));
        }
        let path = format!("{}/notes", task_path(id)?);
        let request = AddNoteRequest {
            text: text.trim().to_string(),
            author,
        };
        let result = self.client.post(&path, &request).await;
        self.invalidate().await;
        result
    }

    pub async fn get_statistics(&self) -> ServiceResult<TaskStatistics> {
        self.cache
            .get_or_fetch("tasks.getTaskStatistics", &(), || {
                self.client.get("/api/tasks/statistics", &())
            })
            .await
    }

    pub async fn bulk_assign(
        &self,
        task_ids: Vec<String>,
        assigned_to: &str,
    ) -> ServiceResult<BulkAssignResult> {
        if task_ids.is_empty() {
            return Err(ServiceError::validation("Select at least one task"));
        }
        if assigned_to.trim().is_empty() {
            return Err(ServiceError::validation("Assignee is required"));
        }
        let request = BulkAssignRequest {
            task_ids,
            assigned_to: assigned_to.to_string(),
        };
        let result = self.client.post("/api/tasks/bulk-assign", &request).await;
        self.invalidate().await;
        result
    }

    pub async fn get_today_tasks(&self) -> ServiceResult<Vec<Task>> {
        self.cached_list("tasks.getTodayTasks", "/api/tasks/today")
            .await
    }

    pub async fn get_overdue_tasks(&self) -> ServiceResult<Vec<Task>> {
        self.cached_list("tasks.getOverdueTasks", "/api/tasks/overdue")
            .await
    }

    pub async fn get_upcoming_reminders(&self) -> ServiceResult<Vec<Task>> {
        self.cached_list("tasks.getUpcomingReminders", "/api/tasks/reminders")
            .await
    }

    async fn cached_list(&self, method: &str, path: &str) -> ServiceResult<Vec<Task>> {
        let result = self
            .cache
            .get_or_fetch(method, &(), || self.client.get(path, &()))
            .await;
        swallow_unauthorized(method, result)
    }

    async fn invalidate(&self) {
        self.cache.invalidate_prefix(TASK_CACHE_PREFIX).await;
    }
}

fn task_path(id: &str) -> ServiceResult<String> {
    resource_path("/api/tasks", id, "Task")
}

fn check_progress(progress: u8) -> ServiceResult<()> {
    if progress > 100 {
        return Err(ServiceError::validation(format!(
            "Progress must be between 0 and 100, got {}",
            progress
        )));
    }
    Ok(())
}
