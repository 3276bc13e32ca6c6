//! Domain model for task definitions.

mod definition;
mod error;
mod ids;

pub use definition::{
    DefinitionName, PersistedDefinitionData, ScheduleInterval, TargetSite, TaskDefinition,
};
pub use error::{DefinitionDomainError, ParseTargetSiteError};
pub use ids::TaskDefinitionId;
