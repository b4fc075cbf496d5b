//! Translates a submission into the ordered capability list a worker must satisfy.
//!
//! Output order is fixed: caller selectors (input order, blanks dropped), then the system
//! selector pinned to the runner tag, then at most one execution-location pin.
use std::sync::Arc;

use relay_model::{Capability, SubmitSpec};
use tracing::{debug, instrument, trace};

use crate::{
    error::{CoreError, CoreResult},
    location::LocationLookup,
};

pub struct CapabilityResolver {
    locations: Arc<dyn LocationLookup>,
}

impl CapabilityResolver {
    pub fn new(locations: Arc<dyn LocationLookup>) -> Self {
        Self { locations }
    }

    /// Build the capability list for `spec`.
    ///
    /// Has no side effects beyond the location lookup.
    #[instrument(level = "debug", skip(self, spec), fields(account = %spec.account_id, task_type = %spec.task_type))]
    pub async fn resolve(&self, spec: &SubmitSpec) -> CoreResult<Vec<Capability>> {
        let runner_tag = spec.runner_tag.trim();
        if runner_tag.is_empty() {
            return Err(CoreError::MissingRunnerTag);
        }

        let mut caps: Vec<Capability> = spec
            .selectors
            .iter()
            .filter_map(|s| s.to_capability())
            .collect();
        trace!(user_selectors = caps.len(), "collected user selectors");

        caps.push(Capability::system_selector(runner_tag));

        if let Some(infra_ref) = spec.execution_infra_ref.as_deref() {
            let group = self
                .locations
                .worker_group(infra_ref)
                .await?
                .ok_or_else(|| CoreError::InfrastructureLocationNotFound(infra_ref.to_string()))?;
            debug!(infra_ref, worker_group = %group, "pinned task to execution location");
            caps.push(Capability::location(infra_ref, group));
        }
        Ok(caps)
    }
}
