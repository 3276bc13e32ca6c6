//! Task definition aggregate and related scrape-target types.

use super::{DefinitionDomainError, ParseTargetSiteError, TaskDefinitionId};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// E-commerce source a definition scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSite {
    /// Amazon marketplace listings.
    Amazon,
    /// eBay listings.
    Ebay,
    /// Walmart catalogue.
    Walmart,
    /// Etsy shops.
    Etsy,
    /// `AliExpress` listings.
    AliExpress,
    /// Shopify storefronts.
    Shopify,
}

impl TargetSite {
    /// Every supported target site.
    pub const ALL: [Self; 6] = [
        Self::Amazon,
        Self::Ebay,
        Self::Walmart,
        Self::Etsy,
        Self::AliExpress,
        Self::Shopify,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Ebay => "ebay",
            Self::Walmart => "walmart",
            Self::Etsy => "etsy",
            Self::AliExpress => "aliexpress",
            Self::Shopify => "shopify",
        }
    }
}

impl TryFrom<&str> for TargetSite {
    type Error = ParseTargetSiteError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|site| site.as_str() == normalized)
            .ok_or_else(|| ParseTargetSiteError(value.to_owned()))
    }
}

impl fmt::Display for TargetSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated human-readable definition name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionName(String);

impl DefinitionName {
    const MAX_LENGTH: usize = 255;

    /// Creates a validated definition name.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionDomainError::EmptyName`] when the trimmed value is
    /// empty or [`DefinitionDomainError::NameTooLong`] when it exceeds the
    /// storage limit.
    pub fn new(value: impl Into<String>) -> Result<Self, DefinitionDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DefinitionDomainError::EmptyName);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(DefinitionDomainError::NameTooLong(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefinitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed interval between scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleInterval(u64);

impl ScheduleInterval {
    /// Longest accepted interval (366 days).
    const MAX_SECONDS: u64 = 366 * 24 * 60 * 60;

    /// Creates a validated schedule interval.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionDomainError::InvalidScheduleInterval`] when the
    /// interval is zero or longer than 366 days.
    pub const fn from_secs(seconds: u64) -> Result<Self, DefinitionDomainError> {
        if seconds == 0 || seconds > Self::MAX_SECONDS {
            return Err(DefinitionDomainError::InvalidScheduleInterval(seconds));
        }
        Ok(Self(seconds))
    }

    /// Returns the interval in whole seconds.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Returns the interval as a chrono duration.
    #[must_use]
    pub fn as_time_delta(self) -> TimeDelta {
        // MAX_SECONDS keeps the value well inside the i64 range.
        i64::try_from(self.0)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

/// Task definition aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    id: TaskDefinitionId,
    name: DefinitionName,
    target_site: TargetSite,
    is_enabled: bool,
    schedule: Option<ScheduleInterval>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedDefinitionData {
    /// Persisted definition identifier.
    pub id: TaskDefinitionId,
    /// Persisted name.
    pub name: DefinitionName,
    /// Persisted target site.
    pub target_site: TargetSite,
    /// Persisted enablement flag.
    pub is_enabled: bool,
    /// Persisted schedule, if any.
    pub schedule: Option<ScheduleInterval>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TaskDefinition {
    /// Creates a new enabled, unscheduled definition.
    #[must_use]
    pub fn new(name: DefinitionName, target_site: TargetSite, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskDefinitionId::new(),
            name,
            target_site,
            is_enabled: true,
            schedule: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Sets the schedule at construction time.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: ScheduleInterval) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Reconstructs a definition from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedDefinitionData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            target_site: data.target_site,
            is_enabled: data.is_enabled,
            schedule: data.schedule,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the definition identifier.
    #[must_use]
    pub const fn id(&self) -> TaskDefinitionId {
        self.id
    }

    /// Returns the definition name.
    #[must_use]
    pub const fn name(&self) -> &DefinitionName {
        &self.name
    }

    /// Returns the scraped site.
    #[must_use]
    pub const fn target_site(&self) -> TargetSite {
        self.target_site
    }

    /// Returns whether the definition may be enqueued.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Returns the schedule interval, if the definition is scheduled.
    #[must_use]
    pub const fn schedule(&self) -> Option<ScheduleInterval> {
        self.schedule
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Enables or disables the definition.
    pub fn set_enabled(&mut self, is_enabled: bool, clock: &impl Clock) {
        self.is_enabled = is_enabled;
        self.updated_at = clock.utc();
    }

    /// Replaces the schedule; `None` makes the definition manual-only.
    pub fn set_schedule(&mut self, schedule: Option<ScheduleInterval>, clock: &impl Clock) {
        self.schedule = schedule;
        self.updated_at = clock.utc();
    }
}
