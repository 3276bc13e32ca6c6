//! Per-site routing of worker assignments.

use crate::definition::domain::TargetSite;
use crate::execution::ports::{DispatchError, DispatchResult, WorkerAssignment, WorkerDispatcher};
use std::collections::HashMap;
use std::sync::Arc;

/// Routes each assignment to the dispatcher registered for its target site.
///
/// Sites without a registration fail with
/// [`DispatchError::UnsupportedSite`], which the queue service records as a
/// dispatch failure on the execution.
#[derive(Clone, Default)]
pub struct SiteDispatcherRegistry {
    dispatchers: HashMap<TargetSite, Arc<dyn WorkerDispatcher>>,
}

impl SiteDispatcherRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `dispatcher` for `site`, replacing any previous one.
    #[must_use]
    pub fn with_site(mut self, site: TargetSite, dispatcher: Arc<dyn WorkerDispatcher>) -> Self {
        self.dispatchers.insert(site, dispatcher);
        self
    }

    /// Registers one dispatcher for every supported site.
    #[must_use]
    pub fn uniform(dispatcher: &Arc<dyn WorkerDispatcher>) -> Self {
        TargetSite::ALL
            .into_iter()
            .fold(Self::new(), |registry, site| {
                registry.with_site(site, Arc::clone(dispatcher))
            })
    }

    /// Returns whether a dispatcher is registered for `site`.
    #[must_use]
    pub fn supports(&self, site: TargetSite) -> bool {
        self.dispatchers.contains_key(&site)
    }
}

impl std::fmt::Debug for SiteDispatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sites: Vec<&str> = self.dispatchers.keys().map(|site| site.as_str()).collect();
        sites.sort_unstable();
        f.debug_struct("SiteDispatcherRegistry")
            .field("sites", &sites)
            .finish()
    }
}

impl WorkerDispatcher for SiteDispatcherRegistry {
    fn dispatch(&self, assignment: WorkerAssignment) -> DispatchResult<()> {
        let dispatcher = self
            .dispatchers
            .get(&assignment.target_site)
            .ok_or(DispatchError::UnsupportedSite(assignment.target_site))?;
        dispatcher.dispatch(assignment)
    }
}
