//! Submission, release and worker hand-off of one-shot tasks.
mod coordinator;
pub use coordinator::{DispatchCoordinator, ResolvedTask, Submission};

mod waiter;
pub use waiter::{Completion, WaitRegistry};
