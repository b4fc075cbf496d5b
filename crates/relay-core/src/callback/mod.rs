//! Callback registrations and result delivery.
//!
//! A caller registers a [`CallbackDestination`](relay_model::CallbackDestination) once and
//! receives an unguessable token. Tasks submitted with that token have their results (and
//! progress) delivered to the destination through a [`ResultDelivery`] backend.
mod delivery;
pub use delivery::{ChannelDelivery, Delivery, DeliveryEnvelope, ResultDelivery};

mod registry;
pub use registry::{CallbackRegistry, InMemoryCallbackRegistry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("callback registry error: {0}")]
    Registry(String),

    #[error("no subscriber for destination '{0}'")]
    NoSubscriber(String),

    #[error("delivery to '{target}' failed: {reason}")]
    Failed { target: String, reason: String },
}
