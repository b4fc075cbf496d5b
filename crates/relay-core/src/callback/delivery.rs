use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use relay_model::{AccountId, CallbackDestination, CallbackToken, ProgressEvent, TaskId, TaskResult};

use super::DeliveryError;

/// What is being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Result {
        task_id: TaskId,
        account_id: AccountId,
        result: TaskResult,
    },
    Progress {
        task_id: TaskId,
        account_id: AccountId,
        event: ProgressEvent,
    },
}

impl Delivery {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Delivery::Result { task_id, .. } | Delivery::Progress { task_id, .. } => task_id,
        }
    }
}

/// A delivery addressed to a resolved callback destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEnvelope {
    pub token: CallbackToken,
    pub destination: CallbackDestination,
    pub delivery: Delivery,
}

/// Transport that hands results to callback destinations.
#[async_trait]
pub trait ResultDelivery: Send + Sync + 'static {
    async fn deliver(&self, envelope: DeliveryEnvelope) -> Result<(), DeliveryError>;
}

/// In-process delivery that fans envelopes out to every subscriber.
#[derive(Debug, Clone)]
pub struct ChannelDelivery {
    tx: broadcast::Sender<DeliveryEnvelope>,
}

impl ChannelDelivery {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEnvelope> {
        self.tx.subscribe()
    }
}

impl Default for ChannelDelivery {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ResultDelivery for ChannelDelivery {
    async fn deliver(&self, envelope: DeliveryEnvelope) -> Result<(), DeliveryError> {
        let target = envelope.destination.target.clone();
        let task = envelope.delivery.task_id().clone();
        match self.tx.send(envelope) {
            Ok(receivers) => {
                trace!(task = %task, target_name = %target, receivers, "delivery published");
                Ok(())
            }
            Err(_) => Err(DeliveryError::NoSubscriber(target)),
        }
    }
}
