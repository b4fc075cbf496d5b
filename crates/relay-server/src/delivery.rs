use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use relay_api::DeliveryBody;
use relay_core::callback::{DeliveryEnvelope, DeliveryError, ResultDelivery};

/// Delivers results and progress by POSTing JSON to the destination's `http(s)` target.
///
/// Any non-2xx answer counts as a failed delivery.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResultDelivery for WebhookDelivery {
    async fn deliver(&self, envelope: DeliveryEnvelope) -> Result<(), DeliveryError> {
        let target = envelope.destination.target.clone();
        if !(target.starts_with("http://") || target.starts_with("https://")) {
            return Err(DeliveryError::Failed {
                target,
                reason: "unsupported target scheme (expected http or https)".into(),
            });
        }

        let body = DeliveryBody::from(&envelope);
        let res = self
            .client
            .post(&target)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Failed {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(DeliveryError::Failed {
                target,
                reason: format!("receiver answered {status}"),
            });
        }
        debug!(%target, task_id = %envelope.delivery.task_id(), "callback delivered");
        Ok(())
    }
}
