//! Capability descriptors attached to tasks and the worker profiles they are matched against.
//!
//! A task carries an ordered list of [`Capability`] values; a worker is eligible only if it
//! satisfies every one of them.
mod worker;
pub use worker::WorkerProfile;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ORIGIN_DEFAULT;

/// Where a selector requirement came from.
///
/// Only used for diagnostics (dispatch logs); matching ignores it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectorOrigin {
    /// Added by the control plane itself (runner tag, execution location).
    System,
    /// Supplied by the caller; carries the caller-declared origin text.
    User(String),
}

impl SelectorOrigin {
    /// Build a user origin, normalising empty text to [`ORIGIN_DEFAULT`].
    pub fn user(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if origin.trim().is_empty() {
            SelectorOrigin::User(ORIGIN_DEFAULT.to_string())
        } else {
            SelectorOrigin::User(origin)
        }
    }

    /// Returns `true` for system-assigned selectors.
    pub fn is_system(&self) -> bool {
        matches!(self, SelectorOrigin::System)
    }
}

/// A single requirement a worker must satisfy to run a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Capability {
    /// Worker must advertise every label in `selectors`.
    Selector {
        selectors: BTreeSet<String>,
        origin: SelectorOrigin,
    },
    /// Worker must belong to the group bound to a pre-provisioned execution context.
    ExecutionLocation {
        infra_ref: String,
        worker_group: String,
    },
}

impl Capability {
    /// Single-label user selector.
    pub fn selector(label: impl Into<String>, origin: SelectorOrigin) -> Self {
        Capability::Selector {
            selectors: BTreeSet::from([label.into()]),
            origin,
        }
    }

    /// Single-label system selector.
    pub fn system_selector(label: impl Into<String>) -> Self {
        Self::selector(label, SelectorOrigin::System)
    }

    /// Location pin resolved from an execution infrastructure reference.
    pub fn location(infra_ref: impl Into<String>, worker_group: impl Into<String>) -> Self {
        Capability::ExecutionLocation {
            infra_ref: infra_ref.into(),
            worker_group: worker_group.into(),
        }
    }

    /// Returns `true` if the worker satisfies this requirement.
    pub fn matches(&self, worker: &WorkerProfile) -> bool {
        match self {
            Capability::Selector { selectors, .. } => {
                selectors.iter().all(|s| worker.advertises(s))
            }
            Capability::ExecutionLocation { worker_group, .. } => worker.advertises(worker_group),
        }
    }

    /// Origin of a selector requirement; `None` for location pins.
    pub fn origin(&self) -> Option<&SelectorOrigin> {
        match self {
            Capability::Selector { origin, .. } => Some(origin),
            Capability::ExecutionLocation { .. } => None,
        }
    }

    /// Short name of the descriptor variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Capability::Selector { .. } => "selector",
            Capability::ExecutionLocation { .. } => "execution-location",
        }
    }
}

/// Caller-supplied selector as it arrives on the wire, before resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSelector {
    /// Label the worker must advertise. Blank labels are dropped during resolution.
    pub selector: String,
    /// Free-text origin; blank means [`ORIGIN_DEFAULT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl TaskSelector {
    /// Create a selector with the default origin.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            origin: None,
        }
    }

    /// Attach an explicit origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Convert into a capability; `None` when the label is blank.
    pub fn to_capability(&self) -> Option<Capability> {
        let label = self.selector.trim();
        if label.is_empty() {
            return None;
        }
        let origin = SelectorOrigin::user(self.origin.clone().unwrap_or_default());
        Some(Capability::selector(label, origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountId, WorkerId};

    fn worker(selectors: &[&str]) -> WorkerProfile {
        WorkerProfile::new(WorkerId::from("w-1"), AccountId::from("acc"))
            .with_selectors(selectors.iter().copied())
    }

    #[test]
    fn selector_requires_every_label() {
        let cap = Capability::Selector {
            selectors: BTreeSet::from(["linux".to_string(), "docker".to_string()]),
            origin: SelectorOrigin::System,
        };

        assert!(cap.matches(&worker(&["linux", "docker", "gpu"])));
        assert!(!cap.matches(&worker(&["linux"])));
    }

    #[test]
    fn location_matches_on_worker_group() {
        let cap = Capability::location("infra-1", "group-a");

        assert!(cap.matches(&worker(&["group-a"])));
        assert!(!cap.matches(&worker(&["group-b"])));
    }

    #[test]
    fn origin_is_reported_for_selectors_only() {
        let system = Capability::system_selector("linux");
        assert!(system.origin().is_some_and(SelectorOrigin::is_system));
        assert_eq!(system.kind(), "selector");

        let location = Capability::location("infra-1", "group-a");
        assert!(location.origin().is_none());
        assert_eq!(location.kind(), "execution-location");
    }

    #[test]
    fn blank_selector_yields_no_capability() {
        assert!(TaskSelector::new("   ").to_capability().is_none());
        assert!(TaskSelector::new("").to_capability().is_none());
    }

    #[test]
    fn user_origin_defaults_when_blank() {
        let cap = TaskSelector::new("linux").to_capability().unwrap();
        match cap {
            Capability::Selector { origin, .. } => {
                assert_eq!(origin, SelectorOrigin::User(ORIGIN_DEFAULT.to_string()));
            }
            other => panic!("expected selector, got {other:?}"),
        }

        let cap = TaskSelector::new("linux")
            .with_origin("pipeline")
            .to_capability()
            .unwrap();
        assert!(matches!(
            cap,
            Capability::Selector { origin: SelectorOrigin::User(ref o), .. } if o == "pipeline"
        ));
    }

    #[test]
    fn serde_uses_type_tag() {
        let cap = Capability::location("infra-1", "group-a");
        let json = serde_json::to_value(&cap).unwrap();

        assert_eq!(json["type"], "executionLocation");
        assert_eq!(json["workerGroup"], "group-a");
    }
}
