//! Database repository for CRUD operations.
//!
//! Every query is scoped to a company id; updates use a conditional version check.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    AddNoteRequest, BulkAssignResult, CreateStaffRequest, CreateTaskRequest, StaffMember,
    StaffStatus, Task, TaskListParams, TaskNote, TaskPriority, TaskStatistics, TaskStatus,
    UpdateStaffRequest, UpdateTaskRequest,
};

const STAFF_COLUMNS: &str = "id, company_id, name, role, email, phone, address, avatar, \
    employment, documents, permissions, status, is_deleted, deleted_at, deleted_by, \
    deletion_reason, created_at, updated_at, version";

const TASK_COLUMNS: &str = "id, company_id, assigned_to, task_type, customer, title, \
    description, due_date, priority, status, progress, reminder, tags, notes, created_at, \
    updated_at, completed_at, version";

/// Window in which an enabled reminder counts as upcoming.
const REMINDER_WINDOW_HOURS: i64 = 24;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== STAFF OPERATIONS ====================

    /// List staff of a company, either the active roster or the soft-deleted one.
    pub async fn list_staff(
        &self,
        company_id: &str,
        deleted: bool,
    ) -> Result<Vec<StaffMember>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM staff WHERE company_id = ? AND is_deleted = ? ORDER BY name",
            STAFF_COLUMNS
        ))
        .bind(company_id)
        .bind(deleted as i32)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(staff_from_row).collect()
    }

    /// Get a staff member by ID, deleted or not.
    pub async fn get_staff(
        &self,
        company_id: &str,
        id: &str,
    ) -> Result<Option<StaffMember>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM staff WHERE company_id = ? AND id = ?",
            STAFF_COLUMNS
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(staff_from_row).transpose()
    }

    /// Create a new staff member.
    pub async fn create_staff(
        &self,
        company_id: &str,
        request: &CreateStaffRequest,
    ) -> Result<StaffMember, AppError> {
        let now = Utc::now().to_rfc3339();
        let member = StaffMember {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: request.name.trim().to_string(),
            role: request.role.trim().to_string(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            address: request.address.clone(),
            avatar: request.avatar.clone(),
            employment: request.employment.clone(),
            documents: request.documents.clone(),
            permissions: request.permissions.clone(),
            status: request.status,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            deletion_reason: None,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        };

        sqlx::query(&format!(
            "INSERT INTO staff ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            STAFF_COLUMNS
        ))
        .bind(&member.id)
        .bind(&member.company_id)
        .bind(&member.name)
        .bind(&member.role)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(&member.avatar)
        .bind(serde_json::to_string(&member.employment)?)
        .bind(serde_json::to_string(&member.documents)?)
        .bind(serde_json::to_string(&member.permissions)?)
        .bind(member.status.as_str())
        .bind(0_i32)
        .bind(&member.deleted_at)
        .bind(&member.deleted_by)
        .bind(&member.deletion_reason)
        .bind(&member.created_at)
        .bind(&member.updated_at)
        .bind(member.version)
        .execute(&self.pool)
        .await?;

        Ok(member)
    }

    /// Update a staff member with optimistic concurrency control.
    pub async fn update_staff(
        &self,
        company_id: &str,
        id: &str,
        request: &UpdateStaffRequest,
    ) -> Result<StaffMember, AppError> {
        let existing = self.require_staff(company_id, id).await?;
        check_expected_version(request.expected_version, existing.version)?;

        let mut updated = existing.clone();
        if let Some(name) = &request.name {
            updated.name = name.trim().to_string();
        }
        if let Some(role) = &request.role {
            updated.role = role.trim().to_string();
        }
        updated.email = request.email.clone().or(existing.email.clone());
        updated.phone = request.phone.clone().or(existing.phone.clone());
        updated.address = request.address.clone().or(existing.address.clone());
        updated.avatar = request.avatar.clone().or(existing.avatar.clone());
        if let Some(employment) = &request.employment {
            updated.employment = employment.clone();
        }
        if let Some(documents) = &request.documents {
            updated.documents = documents.clone();
        }
        if let Some(permissions) = &request.permissions {
            updated.permissions = permissions.clone();
        }
        updated.status = request.status.unwrap_or(existing.status);

        self.save_staff(updated, existing.version).await
    }

    /// Flag a staff member as deleted; the record stays restorable.
    pub async fn soft_delete_staff(
        &self,
        company_id: &str,
        id: &str,
        reason: Option<String>,
        deleted_by: Option<String>,
    ) -> Result<StaffMember, AppError> {
        let existing = self.require_staff(company_id, id).await?;
        if existing.is_deleted {
            return Err(AppError::Validation(format!(
                "Staff member {} is already deleted",
                id
            )));
        }

        let mut updated = existing.clone();
        updated.is_deleted = true;
        updated.deleted_at = Some(Utc::now().to_rfc3339());
        updated.deleted_by = deleted_by;
        updated.deletion_reason = reason.filter(|r| !r.trim().is_empty());

        self.save_staff(updated, existing.version).await
    }

    /// Permanently remove a staff member, deleted or not.
    pub async fn hard_delete_staff(&self, company_id: &str, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM staff WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Staff member {} not found", id)));
        }
        Ok(())
    }

    /// Reverse a soft delete.
    pub async fn restore_staff(&self, company_id: &str, id: &str) -> Result<StaffMember, AppError> {
        let existing = self.require_staff(company_id, id).await?;
        if !existing.is_deleted {
            return Err(AppError::Validation(format!(
                "Staff member {} is not deleted",
                id
            )));
        }

        let mut updated = existing.clone();
        updated.is_deleted = false;
        updated.deleted_at = None;
        updated.deleted_by = None;
        updated.deletion_reason = None;

        self.save_staff(updated, existing.version).await
    }

    async fn require_staff(&self, company_id: &str, id: &str) -> Result<StaffMember, AppError> {
        self.get_staff(company_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff member {} not found", id)))
    }

    /// Write `member` back if the stored version still equals `previous_version`.
    async fn save_staff(
        &self,
        mut member: StaffMember,
        previous_version: i64,
    ) -> Result<StaffMember, AppError> {
        member.updated_at = Utc::now().to_rfc3339();
        member.version = previous_version + 1;

        let result = sqlx::query(
            r#"UPDATE staff SET
                name = ?, role = ?, email = ?, phone = ?, address = ?, avatar = ?,
                employment = ?, documents = ?, permissions = ?, status = ?,
                is_deleted = ?, deleted_at = ?, deleted_by = ?, deletion_reason = ?,
                updated_at = ?, version = ?
            WHERE company_id = ? AND id = ? AND version = ?"#,
        )
        .bind(&member.name)
        .bind(&member.role)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&member.address)
        .bind(&member.avatar)
        .bind(serde_json::to_string(&member.employment)?)
        .bind(serde_json::to_string(&member.documents)?)
        .bind(serde_json::to_string(&member.permissions)?)
        .bind(member.status.as_str())
        .bind(member.is_deleted as i32)
        .bind(&member.deleted_at)
        .bind(&member.deleted_by)
        .bind(&member.deletion_reason)
        .bind(&member.updated_at)
        .bind(member.version)
        .bind(&member.company_id)
        .bind(&member.id)
        .bind(previous_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Race condition - version changed between read and write
            let current = self.get_staff(&member.company_id, &member.id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|m| m.version).unwrap_or(0),
            });
        }

        Ok(member)
    }

    // ==================== TASK OPERATIONS ====================

    /// List tasks of a company, narrowed by the optional server-side filters.
    pub async fn list_tasks(
        &self,
        company_id: &str,
        params: &TaskListParams,
    ) -> Result<Vec<Task>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM tasks WHERE company_id = ",
            TASK_COLUMNS
        ));
        query.push_bind(company_id);
        if let Some(status) = params.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = params.priority {
            query.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(assigned_to) = params.assigned_to.as_deref() {
            query.push(" AND assigned_to = ").push_bind(assigned_to);
        }
        if let Some(task_type) = params.task_type.as_deref() {
            query.push(" AND task_type = ").push_bind(task_type);
        }
        query.push(" ORDER BY due_date, title");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(task_from_row).collect()
    }

    /// Get a task by ID.
    pub async fn get_task(&self, company_id: &str, id: &str) -> Result<Option<Task>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tasks WHERE company_id = ? AND id = ?",
            TASK_COLUMNS
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Create a new task.
    pub async fn create_task(
        &self,
        company_id: &str,
        request: &CreateTaskRequest,
    ) -> Result<Task, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            assigned_to: request.assigned_to.clone(),
            task_type: request.task_type.trim().to_string(),
            customer: request.customer.clone(),
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            due_date: request.due_date,
            priority: request.priority,
            status: TaskStatus::Pending,
            progress: request.progress,
            reminder: request.reminder.clone(),
            tags: request.tags.clone(),
            notes: Vec::new(),
            created_at: now.clone(),
            updated_at: now.clone(),
            completed_at: None,
            version: 1,
        };
        apply_status(&mut task, request.status, &now);

        sqlx::query(&format!(
            "INSERT INTO tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TASK_COLUMNS
        ))
        .bind(&task.id)
        .bind(&task.company_id)
        .bind(&task.assigned_to)
        .bind(&task.task_type)
        .bind(&task.customer)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date.to_rfc3339())
        .bind(task.priority.as_str())
        .bind(task.status.as_str())
        .bind(task.progress as i64)
        .bind(serde_json::to_string(&task.reminder)?)
        .bind(serde_json::to_string(&task.tags)?)
        .bind(serde_json::to_string(&task.notes)?)
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .bind(&task.completed_at)
        .bind(task.version)
        .execute(&self.pool)
        .await?;

        Ok(task)
    }

    /// Update a task with optimistic concurrency control.
    pub async fn update_task(
        &self,
        company_id: &str,
        id: &str,
        request: &UpdateTaskRequest,
    ) -> Result<Task, AppError> {
        let existing = self.require_task(company_id, id).await?;
        check_expected_version(request.expected_version, existing.version)?;

        let now = Utc::now().to_rfc3339();
        let mut updated = existing.clone();
        if let Some(assigned_to) = &request.assigned_to {
            updated.assigned_to = assigned_to.clone();
        }
        if let Some(task_type) = &request.task_type {
            updated.task_type = task_type.trim().to_string();
        }
        updated.customer = request.customer.clone().or(existing.customer.clone());
        if let Some(title) = &request.title {
            updated.title = title.trim().to_string();
        }
        if let Some(description) = &request.description {
            updated.description = description.clone();
        }
        updated.due_date = request.due_date.unwrap_or(existing.due_date);
        updated.priority = request.priority.unwrap_or(existing.priority);
        if let Some(reminder) = &request.reminder {
            updated.reminder = reminder.clone();
        }
        if let Some(tags) = &request.tags {
            updated.tags = tags.clone();
        }
        if let Some(progress) = request.progress {
            updated.progress = progress.min(100);
        }
        if let Some(status) = request.status {
            apply_status(&mut updated, status, &now);
        } else if let Some(progress) = request.progress {
            apply_progress(&mut updated, progress, &now);
        }

        self.save_task(updated, existing.version).await
    }

    /// Delete a task.
    pub async fn delete_task(&self, company_id: &str, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", id)));
        }
        Ok(())
    }

    /// Move a task to a new status.
    pub async fn set_task_status(
        &self,
        company_id: &str,
        id: &str,
        status: TaskStatus,
    ) -> Result<Task, AppError> {
        let existing = self.require_task(company_id, id).await?;
        let mut updated = existing.clone();
        apply_status(&mut updated, status, &Utc::now().to_rfc3339());
        self.save_task(updated, existing.version).await
    }

    /// Record task progress; 100 completes the task.
    pub async fn set_task_progress(
        &self,
        company_id: &str,
        id: &str,
        progress: u8,
    ) -> Result<Task, AppError> {
        let existing = self.require_task(company_id, id).await?;
        let mut updated = existing.clone();
        apply_progress(&mut updated, progress, &Utc::now().to_rfc3339());
        self.save_task(updated, existing.version).await
    }

    /// Append a note to a task.
    pub async fn add_task_note(
        &self,
        company_id: &str,
        id: &str,
        request: &AddNoteRequest,
    ) -> Result<Task, AppError> {
        let existing = self.require_task(company_id, id).await?;
        let mut updated = existing.clone();
        updated.notes.push(TaskNote {
            id: uuid::Uuid::new_v4().to_string(),
            text: request.text.trim().to_string(),
            author: request.author.clone(),
            created_at: Utc::now().to_rfc3339(),
        });
        self.save_task(updated, existing.version).await
    }

    /// Reassign many tasks in one transaction. Unknown ids are reported, not fatal.
    pub async fn bulk_assign_tasks(
        &self,
        company_id: &str,
        task_ids: &[String],
        assigned_to: &str,
    ) -> Result<BulkAssignResult, AppError> {
        let mut result = BulkAssignResult {
            updated: Vec::new(),
            missing: Vec::new(),
        };
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        for task_id in task_ids {
            let row = sqlx::query(&format!(
                "SELECT {} FROM tasks WHERE company_id = ? AND id = ?",
                TASK_COLUMNS
            ))
            .bind(company_id)
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(mut task) = row.as_ref().map(task_from_row).transpose()? else {
                result.missing.push(task_id.clone());
                continue;
            };

            let previous_version = task.version;
            task.assigned_to = assigned_to.to_string();
            task.updated_at = now.clone();
            task.version = previous_version + 1;

            sqlx::query(
                "UPDATE tasks SET assigned_to = ?, updated_at = ?, version = ? \
                 WHERE company_id = ? AND id = ? AND version = ?",
            )
            .bind(&task.assigned_to)
            .bind(&task.updated_at)
            .bind(task.version)
            .bind(company_id)
            .bind(task_id)
            .bind(previous_version)
            .execute(&mut *tx)
            .await?;

            result.updated.push(task);
        }

        tx.commit().await?;

        Ok(result)
    }

    /// Tasks due on the UTC calendar day of `now`.
    pub async fn tasks_due_today(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, AppError> {
        let today = now.date_naive();
        let tasks = self.list_tasks(company_id, &TaskListParams::default()).await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.due_date.date_naive() == today)
            .collect())
    }

    /// Open tasks whose due date has passed.
    pub async fn overdue_tasks(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, AppError> {
        let tasks = self.list_tasks(company_id, &TaskListParams::default()).await?;
        Ok(tasks.into_iter().filter(|t| t.is_overdue(now)).collect())
    }

    /// Open tasks with an enabled reminder that fall due within the next day.
    pub async fn upcoming_reminders(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, AppError> {
        let horizon = now + Duration::hours(REMINDER_WINDOW_HOURS);
        let tasks = self.list_tasks(company_id, &TaskListParams::default()).await?;
        Ok(tasks
            .into_iter()
            .filter(|t| {
                t.reminder.enabled
                    && !t.status.is_closed()
                    && t.due_date >= now
                    && t.due_date <= horizon
            })
            .collect())
    }

    pub async fn task_statistics(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TaskStatistics, AppError> {
        let tasks = self.list_tasks(company_id, &TaskListParams::default()).await?;
        Ok(TaskStatistics::compute(&tasks, now))
    }

    async fn require_task(&self, company_id: &str, id: &str) -> Result<Task, AppError> {
        self.get_task(company_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))
    }

    /// Write `task` back if the stored version still equals `previous_version`.
    async fn save_task(&self, mut task: Task, previous_version: i64) -> Result<Task, AppError> {
        task.updated_at = Utc::now().to_rfc3339();
        task.version = previous_version + 1;

        let result = sqlx::query(
            r#"UPDATE tasks SET
                assigned_to = ?, task_type = ?, customer = ?, title = ?, description = ?,
                due_date = ?, priority = ?, status = ?, progress = ?, reminder = ?,
                tags = ?, notes = ?, updated_at = ?, completed_at = ?, version = ?
            WHERE company_id = ? AND id = ? AND version = ?"#,
        )
        .bind(&task.assigned_to)
        .bind(&task.task_type)
        .bind(&task.customer)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date.to_rfc3339())
        .bind(task.priority.as_str())
        .bind(task.status.as_str())
        .bind(task.progress as i64)
        .bind(serde_json::to_string(&task.reminder)?)
        .bind(serde_json::to_string(&task.tags)?)
        .bind(serde_json::to_string(&task.notes)?)
        .bind(&task.updated_at)
        .bind(&task.completed_at)
        .bind(task.version)
        .bind(&task.company_id)
        .bind(&task.id)
        .bind(previous_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_task(&task.company_id, &task.id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|t| t.version).unwrap_or(0),
            });
        }

        Ok(task)
    }
}

/// Set a task's status, keeping progress and `completed_at` consistent with it.
pub fn apply_status(task: &mut Task, status: TaskStatus, now: &str) {
    task.status = status;
    if status == TaskStatus::Completed {
        task.progress = 100;
        if task.completed_at.is_none() {
            task.completed_at = Some(now.to_string());
        }
    } else {
        task.completed_at = None;
    }
}

/// Set a task's progress; reaching 100 completes it, starting work on a pending task starts it.
pub fn apply_progress(task: &mut Task, progress: u8, now: &str) {
    task.progress = progress.min(100);
    if task.progress == 100 {
        apply_status(task, TaskStatus::Completed, now);
    } else if task.progress > 0 && task.status == TaskStatus::Pending {
        task.status = TaskStatus::InProgress;
    }
}

fn check_expected_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::Conflict {
            message: format!(
                "Version mismatch: expected {}, current {}",
                expected, current
            ),
            current_version: current,
        }),
        _ => Ok(()),
    }
}

// Helper functions for row conversion

fn staff_from_row(row: &SqliteRow) -> Result<StaffMember, AppError> {
    let status: String = row.try_get("status")?;
    let is_deleted: i32 = row.try_get("is_deleted")?;
    Ok(StaffMember {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        avatar: row.try_get("avatar")?,
        employment: parse_json_column(row, "employment")?,
        documents: parse_json_column(row, "documents")?,
        permissions: parse_json_column(row, "permissions")?,
        status: StaffStatus::parse(&status).unwrap_or_default(),
        is_deleted: is_deleted != 0,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: row.try_get("deleted_by")?,
        deletion_reason: row.try_get("deletion_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task, AppError> {
    let due_date: String = row.try_get("due_date")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let progress: i64 = row.try_get("progress")?;
    Ok(Task {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        assigned_to: row.try_get("assigned_to")?,
        task_type: row.try_get("task_type")?,
        customer: row.try_get("customer")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        due_date: DateTime::parse_from_rfc3339(&due_date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| AppError::Database(format!("Invalid due_date {:?}: {}", due_date, e)))?,
        priority: TaskPriority::parse(&priority).unwrap_or_default(),
        status: TaskStatus::parse(&status).unwrap_or_default(),
        progress: progress.clamp(0, 100) as u8,
        reminder: parse_json_column(row, "reminder")?,
        tags: parse_json_column(row, "tags")?,
        notes: parse_json_column(row, "notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        version: row.try_get("version")?,
    })
}

fn parse_json_column<T: DeserializeOwned + Default>(
    row: &SqliteRow,
    column: &str,
) -> Result<T, AppError> {
    let raw: Option<String> = row.try_get(column)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            tracing::warn!(column = %column, error = %e, "Corrupt JSON column");
            AppError::Database(format!("Invalid JSON in column {}: {}", column, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::Employment;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn staff_request(name: &str) -> CreateStaffRequest {
        CreateStaffRequest {
            name: name.to_string(),
            role: "sales".to_string(),
            employment: Employment {
                join_date: Some("2023-04-01".to_string()),
                salary: Some(42_000.0),
                department: Some("Sales".to_string()),
            },
            ..Default::default()
        }
    }

    fn task_request(title: &str, due: DateTime<Utc>) -> CreateTaskRequest {
        CreateTaskRequest {
            assigned_to: "staff-1".to_string(),
            task_type: "follow-up".to_string(),
            customer: Some("Acme Traders".to_string()),
            title: title.to_string(),
            description: String::new(),
            due_date: due,
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            progress: 0,
            reminder: Default::default(),
            tags: vec!["crm".to_string()],
        }
    }

    #[tokio::test]
    async fn test_soft_delete_moves_between_lists_and_restores() {
        let (repo, _dir) = repo().await;
        let member = repo.create_staff("acme", &staff_request("Ravi")).await.unwrap();

        let deleted = repo
            .soft_delete_staff("acme", &member.id, Some("left".into()), Some("admin".into()))
            .await
            .unwrap();
        assert!(deleted.is_deleted);
        assert_eq!(deleted.deletion_reason.as_deref(), Some("left"));
        assert!(repo.list_staff("acme", false).await.unwrap().is_empty());
        assert_eq!(repo.list_staff("acme", true).await.unwrap().len(), 1);

        let restored = repo.restore_staff("acme", &member.id).await.unwrap();
        assert!(!restored.is_deleted);
        assert!(restored.deleted_at.is_none());
        assert_eq!(repo.list_staff("acme", false).await.unwrap().len(), 1);
        assert!(repo.list_staff("acme", true).await.unwrap().is_empty());
        assert_eq!(restored.version, 3);
    }

    #[tokio::test]
    async fn test_restore_requires_soft_deleted_member() {
        let (repo, _dir) = repo().await;
        let member = repo.create_staff("acme", &staff_request("Ravi")).await.unwrap();

        assert!(matches!(
            repo.restore_staff("acme", &member.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            repo.restore_staff("acme", "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_json_column_is_an_error() {
        let (repo, _dir) = repo().await;
        let member = repo.create_staff("acme", &staff_request("Ravi")).await.unwrap();

        sqlx::query("UPDATE staff SET employment = '{not json' WHERE id = ?")
            .bind(&member.id)
            .execute(&repo.pool)
            .await
            .unwrap();
        assert!(matches!(
            repo.get_staff("acme", &member.id).await,
            Err(AppError::Database(_))
        ));

        sqlx::query("UPDATE staff SET employment = '' WHERE id = ?")
            .bind(&member.id)
            .execute(&repo.pool)
            .await
            .unwrap();
        let reloaded = repo.get_staff("acme", &member.id).await.unwrap().unwrap();
        assert!(reloaded.employment.department.is_none());
    }

    #[tokio::test]
    async fn test_staff_is_scoped_to_company() {
        let (repo, _dir) = repo().await;
        let member = repo.create_staff("acme", &staff_request("Ravi")).await.unwrap();

        assert!(repo.get_staff("globex", &member.id).await.unwrap().is_none());
        assert!(matches!(
            repo.hard_delete_staff("globex", &member.id).await,
            Err(AppError::NotFound(_))
        ));
        repo.hard_delete_staff("acme", &member.id).await.unwrap();
        assert!(repo.get_staff("acme", &member.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_staff_version_conflict() {
        let (repo, _dir) = repo().await;
        let member = repo.create_staff("acme", &staff_request("Ravi")).await.unwrap();

        let request = UpdateStaffRequest {
            name: Some("Ravi K".to_string()),
            expected_version: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            repo.update_staff("acme", &member.id, &request).await,
            Err(AppError::Conflict {
                current_version: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_task_status_and_progress_rules() {
        let (repo, _dir) = repo().await;
        let task = repo
            .create_task("acme", &task_request("Quote", Utc::now()))
            .await
            .unwrap();

        let started = repo.set_task_progress("acme", &task.id, 40).await.unwrap();
        assert_eq!(started.status, TaskStatus::InProgress);

        let done = repo.set_task_progress("acme", &task.id, 100).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());

        let reopened = repo
            .set_task_status("acme", &task.id, TaskStatus::Delayed)
            .await
            .unwrap();
        assert!(reopened.completed_at.is_none());
        assert_eq!(reopened.version, 4);
    }

    #[tokio::test]
    async fn test_list_tasks_filters_and_due_windows() {
        let (repo, _dir) = repo().await;
        let now = Utc::now();
        let overdue = repo
            .create_task("acme", &task_request("Overdue", now - Duration::days(3)))
            .await
            .unwrap();
        let mut soon = task_request("Soon", now + Duration::hours(2));
        soon.reminder.enabled = true;
        soon.priority = TaskPriority::Urgent;
        repo.create_task("acme", &soon).await.unwrap();
        repo.create_task("acme", &task_request("Later", now + Duration::days(10)))
            .await
            .unwrap();

        let urgent = repo
            .list_tasks(
                "acme",
                &TaskListParams {
                    priority: Some(TaskPriority::Urgent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].title, "Soon");

        let late = repo.overdue_tasks("acme", now).await.unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].id, overdue.id);

        let reminders = repo.upcoming_reminders("acme", now).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].title, "Soon");
    }

    #[tokio::test]
    async fn test_bulk_assign_reports_missing_ids() {
        let (repo, _dir) = repo().await;
        let task = repo
            .create_task("acme", &task_request("Quote", Utc::now()))
            .await
            .unwrap();

        let result = repo
            .bulk_assign_tasks("acme", &[task.id.clone(), "nope".to_string()], "staff-2")
            .await
            .unwrap();
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.missing, vec!["nope".to_string()]);

        let reloaded = repo.get_task("acme", &task.id).await.unwrap().unwrap();
        assert_eq!(reloaded.assigned_to, "staff-2");
        assert_eq!(reloaded.version, 2);
    }
}
