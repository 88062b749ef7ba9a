//! Task board: the loaded task list, its filter state and the status actions.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};

use crate::client::{ServiceResult, TaskService};
use crate::models::{Task, TaskListParams, TaskPriority, TaskStatistics, TaskStatus};
use crate::query::{compare_text, Filter, ListState, ListView, Page, SortDirection};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilters {
    pub status: Filter<TaskStatus>,
    pub priority: Filter<TaskPriority>,
    pub task_type: Filter<String>,
    pub assigned_to: Filter<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSortKey {
    #[default]
    DueDate,
    Priority,
    Title,
    Progress,
    Created,
}

/// Search, filter and sort rules for task lists.
pub struct TaskView;

impl ListView for TaskView {
    type Item = Task;
    type Filters = TaskFilters;
    type SortKey = TaskSortKey;

    fn search_fields(task: &Task) -> Vec<&str> {
        let mut fields = vec![
            task.title.as_str(),
            task.description.as_str(),
            task.task_type.as_str(),
        ];
        fields.extend(task.customer.as_deref());
        fields.extend(task.tags.iter().map(String::as_str));
        fields
    }

    fn matches_filters(filters: &TaskFilters, task: &Task) -> bool {
        filters.status.matches(&task.status)
            && filters.priority.matches(&task.priority)
            && filters.task_type.matches(&task.task_type)
            && filters.assigned_to.matches(&task.assigned_to)
    }

    fn compare(key: TaskSortKey, a: &Task, b: &Task) -> Ordering {
        match key {
            TaskSortKey::DueDate => a.due_date.cmp(&b.due_date),
            TaskSortKey::Priority => a.priority.cmp(&b.priority),
            TaskSortKey::Title => compare_text(&a.title, &b.title),
            TaskSortKey::Progress => a.progress.cmp(&b.progress),
            TaskSortKey::Created => a.created_at.cmp(&b.created_at),
        }
    }

    fn default_direction(key: TaskSortKey) -> SortDirection {
        match key {
            TaskSortKey::DueDate | TaskSortKey::Title => SortDirection::Asc,
            TaskSortKey::Priority | TaskSortKey::Progress | TaskSortKey::Created => {
                SortDirection::Desc
            }
        }
    }
}

/// Clears the loading flag and wakes waiting actions when a refresh ends, however it ends.
struct LoadingGuard<'a> {
    loading: &'a AtomicBool,
    finished: &'a Notify,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.store(false, AtomicOrdering::Release);
        self.finished.notify_waiters();
    }
}

/// Loaded tasks plus the board's list state.
pub struct TaskBoard {
    service: TaskService,
    params: RwLock<TaskListParams>,
    tasks: RwLock<Vec<Task>>,
    list: RwLock<ListState<TaskView>>,
    loading: AtomicBool,
    /// Set by a write that needs a fetch issued after it; consumed by the running refresh.
    reload: AtomicBool,
    finished: Notify,
}

impl TaskBoard {
    pub fn new(service: TaskService, page_size: usize) -> Self {
        Self {
            service,
            params: RwLock::new(TaskListParams::default()),
            tasks: RwLock::new(Vec::new()),
            list: RwLock::new(ListState::new(page_size)),
            loading: AtomicBool::new(false),
            reload: AtomicBool::new(false),
            finished: Notify::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(AtomicOrdering::Acquire)
    }

    /// Reload tasks from the API.
    ///
    /// Returns `Ok(false)` without fetching when another refresh is still running.
    /// A refresh that overlaps a write fetches again once its current request returns.
    pub async fn refresh(&self) -> ServiceResult<bool> {
        if self.loading.swap(true, AtomicOrdering::AcqRel) {
            tracing::debug!("Task refresh already in flight, skipping");
            return Ok(false);
        }
        let _guard = LoadingGuard {
            loading: &self.loading,
            finished: &self.finished,
        };

        loop {
            self.reload.store(false, AtomicOrdering::Release);
            let params = self.params.read().await.clone();
            let tasks = self.service.get_all_tasks(&params).await?;
            tracing::debug!(count = tasks.len(), "Task board refreshed");
            *self.tasks.write().await = tasks;
            if !self.reload.load(AtomicOrdering::Acquire) {
                return Ok(true);
            }
            tracing::debug!("Tasks changed during refresh, fetching again");
        }
    }

    /// Refresh after a write, waiting for a running refresh to pick the write up.
    async fn refresh_after_write(&self) -> ServiceResult<()> {
        self.reload.store(true, AtomicOrdering::Release);
        loop {
            let finished = self.finished.notified();
            if self.refresh().await? {
                return Ok(());
            }
            finished.await;
            if !self.reload.load(AtomicOrdering::Acquire) {
                return Ok(());
            }
        }
    }

    /// Change the server-side filters. Takes effect on the next refresh.
    pub async fn set_params(&self, params: TaskListParams) {
        *self.params.write().await = params;
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    /// Mutate the list state (search, filters, sort, page).
    pub async fn with_list<R>(&self, change: impl FnOnce(&mut ListState<TaskView>) -> R) -> R {
        change(&mut *self.list.write().await)
    }

    /// Current page of the filtered, sorted tasks.
    pub async fn view(&self) -> Page<Task> {
        let tasks = self.tasks.read().await;
        self.list.read().await.apply(&tasks)
    }

    /// Statistics over the loaded tasks, without a round trip.
    pub async fn summary(&self, now: DateTime<Utc>) -> TaskStatistics {
        TaskStatistics::compute(&self.tasks.read().await, now)
    }

    /// Move a task to in-progress, then refresh.
    pub async fn start(&self, id: &str) -> ServiceResult<Task> {
        let task = self.service.update_status(id, TaskStatus::InProgress).await?;
        self.refresh_after_write().await?;
        Ok(task)
    }

    /// Mark a task completed, then refresh.
    pub async fn complete(&self, id: &str) -> ServiceResult<Task> {
        let task = self.service.update_status(id, TaskStatus::Completed).await?;
        self.refresh_after_write().await?;
        Ok(task)
    }

    /// Delete a task, then refresh.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.service.delete_task(id).await?;
        tracing::info!(task_id = %id, "Task deleted");
        self.refresh_after_write().await?;
        Ok(())
    }
}
