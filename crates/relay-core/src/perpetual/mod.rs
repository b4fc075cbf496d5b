//! Recurring background tasks and their duplicate suppression.
mod manager;
pub use manager::PerpetualManager;

mod store;
pub use store::{MemoryPerpetualStore, PerpetualStore};
