use serde::{Deserialize, Serialize};

use crate::Labels;

/// Where results for a callback token are delivered.
///
/// The control plane treats the destination as opaque: `target` names the receiving
/// component (a queue, a service endpoint) and `attributes` carry whatever it needs to
/// route the delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackDestination {
    pub target: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub attributes: Labels,
}

impl CallbackDestination {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attributes: Labels::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.attributes.insert(key, val);
        self
    }
}
