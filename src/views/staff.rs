//! Staff directory: active and deleted lists, and the delete/restore flow.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::client::{ServiceError, ServiceResult, StaffService};
use crate::models::{DeleteMode, StaffMember, StaffStatus};
use crate::query::{compare_text, Filter, ListState, ListView, Page, SortDirection};

/// Phrase that must be typed to confirm a permanent deletion.
pub const HARD_DELETE_CONFIRMATION: &str = "DELETE";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffFilters {
    pub role: Filter<String>,
    pub status: Filter<StaffStatus>,
    pub department: Filter<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaffSortKey {
    #[default]
    Name,
    JoinDate,
    Salary,
    Role,
}

/// Search, filter and sort rules for staff lists.
pub struct StaffView;

impl ListView for StaffView {
    type Item = StaffMember;
    type Filters = StaffFilters;
    type SortKey = StaffSortKey;

    fn search_fields(member: &StaffMember) -> Vec<&str> {
        let mut fields = vec![member.name.as_str(), member.role.as_str()];
        fields.extend(member.email.as_deref());
        fields.extend(member.phone.as_deref());
        fields.extend(member.employment.department.as_deref());
        fields
    }

    fn matches_filters(filters: &StaffFilters, member: &StaffMember) -> bool {
        filters.role.matches(&member.role)
            && filters.status.matches(&member.status)
            && match filters.department.value() {
                None => true,
                Some(dept) => member.employment.department.as_deref() == Some(dept.as_str()),
            }
    }

    fn compare(key: StaffSortKey, a: &StaffMember, b: &StaffMember) -> Ordering {
        match key {
            StaffSortKey::Name => compare_text(&a.name, &b.name),
            StaffSortKey::JoinDate => a.employment.join_date.cmp(&b.employment.join_date),
            StaffSortKey::Salary => salary(a).total_cmp(&salary(b)),
            StaffSortKey::Role => compare_text(&a.role, &b.role),
        }
    }

    fn default_direction(key: StaffSortKey) -> SortDirection {
        match key {
            StaffSortKey::Name | StaffSortKey::Role => SortDirection::Asc,
            StaffSortKey::JoinDate | StaffSortKey::Salary => SortDirection::Desc,
        }
    }
}

/// Members without a salary sort below every paid member.
fn salary(member: &StaffMember) -> f64 {
    member.employment.salary.unwrap_or(f64::NEG_INFINITY)
}

/// Pending deletion of one staff member.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePrompt {
    pub staff_id: String,
    pub staff_name: String,
    pub mode: Option<DeleteMode>,
    pub reason: String,
    pub confirmation: String,
}

impl DeletePrompt {
    fn new(member: &StaffMember) -> Self {
        Self {
            staff_id: member.id.clone(),
            staff_name: member.name.clone(),
            mode: None,
            reason: String::new(),
            confirmation: String::new(),
        }
    }

    pub fn choose_mode(&mut self, mode: DeleteMode) {
        self.mode = Some(mode);
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    pub fn set_confirmation(&mut self, confirmation: impl Into<String>) {
        self.confirmation = confirmation.into();
    }

    /// Mode and trimmed reason, once the prompt is complete.
    pub fn validate(&self) -> ServiceResult<(DeleteMode, Option<String>)> {
        let mode = self
            .mode
            .ok_or_else(|| ServiceError::validation("Choose how to delete this staff member"))?;
        if mode == DeleteMode::Hard && self.confirmation.trim() != HARD_DELETE_CONFIRMATION {
            return Err(ServiceError::validation(format!(
                "Type {} to permanently delete {}",
                HARD_DELETE_CONFIRMATION, self.staff_name
            )));
        }
        let reason = Some(self.reason.trim().to_string()).filter(|r| !r.is_empty());
        Ok((mode, reason))
    }

    pub fn can_confirm(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Active and deleted staff lists with their filter states.
pub struct StaffDirectory {
    service: StaffService,
    active: Vec<StaffMember>,
    deleted: Vec<StaffMember>,
    list: ListState<StaffView>,
    deleted_list: ListState<StaffView>,
    prompt: Option<DeletePrompt>,
}

impl StaffDirectory {
    pub fn new(service: StaffService, page_size: usize) -> Self {
        Self {
            service,
            active: Vec::new(),
            deleted: Vec::new(),
            list: ListState::new(page_size),
            deleted_list: ListState::new(page_size),
            prompt: None,
        }
    }

    /// Fetch the active and the deleted list together.
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let (active, deleted) = tokio::join!(
            self.service.get_all_staff(),
            self.service.get_deleted_staff()
        );
        self.active = active?;
        self.deleted = deleted?;
        tracing::debug!(
            active = self.active.len(),
            deleted = self.deleted.len(),
            "Staff lists refreshed"
        );
        Ok(())
    }

    pub fn active(&self) -> &[StaffMember] {
        &self.active
    }

    pub fn deleted(&self) -> &[StaffMember] {
        &self.deleted
    }

    pub fn list(&self) -> &ListState<StaffView> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut ListState<StaffView> {
        &mut self.list
    }

    pub fn deleted_list_mut(&mut self) -> &mut ListState<StaffView> {
        &mut self.deleted_list
    }

    /// Current page of the active list.
    pub fn visible(&self) -> Page<StaffMember> {
        self.list.apply(&self.active)
    }

    /// Current page of the deleted list.
    pub fn visible_deleted(&self) -> Page<StaffMember> {
        self.deleted_list.apply(&self.deleted)
    }

    /// Distinct departments of active staff, for the department filter.
    pub fn departments(&self) -> Vec<String> {
        self.active
            .iter()
            .filter_map(|m| m.employment.department.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct roles of active staff, for the role filter.
    pub fn roles(&self) -> Vec<String> {
        self.active
            .iter()
            .map(|m| m.role.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Open the delete prompt for an active member.
    pub fn open_delete(&mut self, id: &str) -> ServiceResult<&mut DeletePrompt> {
        let member = self
            .active
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ServiceError::validation(format!("Staff member {} is not active", id)))?;
        Ok(self.prompt.insert(DeletePrompt::new(member)))
    }

    pub fn prompt(&self) -> Option<&DeletePrompt> {
        self.prompt.as_ref()
    }

    pub fn prompt_mut(&mut self) -> Option<&mut DeletePrompt> {
        self.prompt.as_mut()
    }

    pub fn cancel_delete(&mut self) {
        self.prompt = None;
    }

    /// Run the prompted deletion, then refetch both lists.
    ///
    /// An incomplete prompt or a failed call keeps the prompt open.
    pub async fn confirm_delete(&mut self) -> ServiceResult<Option<StaffMember>> {
        let prompt = self
            .prompt
            .as_ref()
            .ok_or_else(|| ServiceError::validation("No deletion in progress"))?;
        let (mode, reason) = prompt.validate()?;
        let id = prompt.staff_id.clone();

        let removed = self.service.delete_staff(&id, mode, reason).await?;
        tracing::info!(staff_id = %id, mode = ?mode, "Staff member deleted");
        self.prompt = None;
        self.refresh().await?;
        Ok(removed)
    }

    /// Reverse a soft deletion, then refetch both lists.
    pub async fn restore(&mut self, id: &str) -> ServiceResult<StaffMember> {
        let member = self.service.restore_staff(id).await?;
        tracing::info!(staff_id = %id, "Staff member restored");
        self.refresh().await?;
        Ok(member)
    }
}
