//! Read-side query types for listing executions.

use super::{ExecutionDomainError, ExecutionStatus, TaskExecution, TriggerType};
use crate::definition::domain::TaskDefinitionId;
use serde::{Deserialize, Serialize};

/// Optional predicates for execution listings. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFilter {
    /// Restrict to one definition.
    pub definition_id: Option<TaskDefinitionId>,
    /// Restrict to one status.
    pub status: Option<ExecutionStatus>,
    /// Restrict to one trigger type.
    pub trigger_type: Option<TriggerType>,
}

impl ExecutionFilter {
    /// Creates a filter that matches every execution.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            definition_id: None,
            status: None,
            trigger_type: None,
        }
    }

    /// Restricts the filter to one definition.
    #[must_use]
    pub const fn for_definition(mut self, definition_id: TaskDefinitionId) -> Self {
        self.definition_id = Some(definition_id);
        self
    }

    /// Restricts the filter to one status.
    #[must_use]
    pub const fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the filter to one trigger type.
    #[must_use]
    pub const fn with_trigger_type(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = Some(trigger_type);
        self
    }

    /// Returns whether an execution satisfies every set predicate.
    #[must_use]
    pub fn matches(&self, execution: &TaskExecution) -> bool {
        self.definition_id
            .is_none_or(|id| execution.definition_id() == id)
            && self.status.is_none_or(|status| execution.status() == status)
            && self
                .trigger_type
                .is_none_or(|trigger| execution.trigger_type() == trigger)
    }
}

/// Sort order over `created_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recent first.
    #[default]
    NewestFirst,
    /// Oldest first.
    OldestFirst,
}

/// One-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Creates a validated page request.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::InvalidPageRequest`] when either value
    /// is zero.
    pub const fn new(page: u32, per_page: u32) -> Result<Self, ExecutionDomainError> {
        if page == 0 || per_page == 0 {
            return Err(ExecutionDomainError::InvalidPageRequest { page, per_page });
        }
        Ok(Self { page, per_page })
    }

    /// Returns the first page with the given size, substituting one for zero.
    #[must_use]
    pub const fn first(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: if per_page == 0 { 1 } else { per_page },
        }
    }

    /// Returns the one-based page number.
    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    /// Returns the page size.
    #[must_use]
    pub const fn per_page(self) -> u32 {
        self.per_page
    }

    /// Returns the number of rows skipped before this page.
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    /// Caps the page size at `max_per_page`.
    #[must_use]
    pub fn clamped(self, max_per_page: u32) -> Self {
        Self {
            page: self.page,
            per_page: self.per_page.min(max_per_page.max(1)),
        }
    }
}

/// One page of executions plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPage {
    /// Executions on this page.
    pub items: Vec<TaskExecution>,
    /// Number of executions matching the filter across all pages.
    pub total: u64,
    /// The window this page was produced for.
    pub page: PageRequest,
}

impl ExecutionPage {
    /// Returns the number of pages needed to show every match.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page.per_page as u64)
    }
}
