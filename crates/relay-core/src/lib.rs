pub mod callback;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod location;
pub mod metrics;
pub mod perpetual;
pub mod resolver;
pub mod service;
pub mod store;
pub mod tracker;

pub mod prelude {
    pub use crate::callback::{CallbackRegistry, ChannelDelivery, ResultDelivery};
    pub use crate::config::CoreConfig;
    pub use crate::dispatch::Submission;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::fleet::{LocalFleet, WorkerFleet};
    pub use crate::location::{LocationLookup, StaticLocations};
    pub use crate::metrics::{MetricsBackend, MetricsHandle};
    pub use crate::service::{TaskService, TaskServiceBuilder};
    pub use crate::tracker::ReportAck;
}
