//! Shared fixtures for in-memory queue integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;
use scrapeyard::{
    definition::{
        adapters::memory::InMemoryTaskDefinitionRepository,
        domain::{DefinitionName, ScheduleInterval, TargetSite, TaskDefinition},
        ports::TaskDefinitionRepository,
    },
    execution::{
        adapters::{RecordingDispatcher, memory::InMemoryExecutionStore},
        services::{QueryLimits, TaskQueueService},
    },
};

/// Queue service wired to in-memory adapters and a manual clock.
pub type TestQueue = TaskQueueService<
    InMemoryTaskDefinitionRepository,
    InMemoryExecutionStore,
    InMemoryExecutionStore,
    RecordingDispatcher,
    ManualClock,
>;

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything a queue test needs to reach behind the service.
pub struct QueueHarness {
    pub queue: Arc<TestQueue>,
    pub definitions: Arc<InMemoryTaskDefinitionRepository>,
    pub store: Arc<InMemoryExecutionStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub clock: Arc<ManualClock>,
}

impl QueueHarness {
    /// Builds a harness with the given query limits.
    #[must_use]
    pub fn with_limits(limits: QueryLimits) -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 6, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let definitions = Arc::new(InMemoryTaskDefinitionRepository::new());
        let store = Arc::new(InMemoryExecutionStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let clock = Arc::new(ManualClock::starting_at(start));
        let queue = TaskQueueService::new(
            Arc::clone(&definitions),
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            Arc::clone(&clock),
        )
        .with_limits(limits);
        Self {
            queue: Arc::new(queue),
            definitions,
            store,
            dispatcher,
            clock,
        }
    }

    /// Stores an enabled, unscheduled definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the store fails.
    pub async fn definition(&self, name: &str, site: TargetSite) -> eyre::Result<TaskDefinition> {
        let definition = TaskDefinition::new(DefinitionName::new(name)?, site, &*self.clock);
        self.definitions.store(&definition).await?;
        Ok(definition)
    }

    /// Stores a disabled definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the store fails.
    pub async fn disabled_definition(&self, name: &str) -> eyre::Result<TaskDefinition> {
        let mut definition =
            TaskDefinition::new(DefinitionName::new(name)?, TargetSite::Amazon, &*self.clock);
        definition.set_enabled(false, &*self.clock);
        self.definitions.store(&definition).await?;
        Ok(definition)
    }

    /// Stores an enabled definition that runs every `interval_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or interval is invalid or the store
    /// fails.
    pub async fn scheduled_definition(
        &self,
        name: &str,
        interval_secs: u64,
    ) -> eyre::Result<TaskDefinition> {
        let definition =
            TaskDefinition::new(DefinitionName::new(name)?, TargetSite::Walmart, &*self.clock)
                .with_schedule(ScheduleInterval::from_secs(interval_secs)?);
        self.definitions.store(&definition).await?;
        Ok(definition)
    }
}

/// Provides a harness with default query limits.
#[fixture]
pub fn harness() -> QueueHarness {
    QueueHarness::with_limits(QueryLimits::default())
}
