use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use relay_model::{CallbackDestination, CallbackToken};

use super::DeliveryError;

#[async_trait]
pub trait CallbackRegistry: Send + Sync + 'static {
    /// Store a destination under a freshly minted token. Registrations are never overwritten.
    async fn register(&self, destination: CallbackDestination)
    -> Result<CallbackToken, DeliveryError>;

    async fn resolve(
        &self,
        token: &CallbackToken,
    ) -> Result<Option<CallbackDestination>, DeliveryError>;

    /// Drop a registration. Returns `false` if the token was unknown.
    async fn invalidate(&self, token: &CallbackToken) -> Result<bool, DeliveryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCallbackRegistry {
    entries: DashMap<CallbackToken, CallbackDestination>,
}

impl InMemoryCallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallbackRegistry for InMemoryCallbackRegistry {
    async fn register(
        &self,
        destination: CallbackDestination,
    ) -> Result<CallbackToken, DeliveryError> {
        if destination.target.trim().is_empty() {
            return Err(DeliveryError::Registry(
                "callback target must not be empty".into(),
            ));
        }
        let token = CallbackToken::generate();
        match self.entries.entry(token.clone()) {
            Entry::Occupied(_) => Err(DeliveryError::Registry(format!(
                "token collision: {token}"
            ))),
            Entry::Vacant(e) => {
                debug!(target_name = %destination.target, "callback registered");
                e.insert(destination);
                Ok(token)
            }
        }
    }

    async fn resolve(
        &self,
        token: &CallbackToken,
    ) -> Result<Option<CallbackDestination>, DeliveryError> {
        Ok(self.entries.get(token).map(|d| d.value().clone()))
    }

    async fn invalidate(&self, token: &CallbackToken) -> Result<bool, DeliveryError> {
        Ok(self.entries.remove(token).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_resolve_invalidate() {
        let registry = InMemoryCallbackRegistry::new();
        let dest = CallbackDestination::new("queue://results").with_attribute("topic", "ci");

        let token = registry.register(dest.clone()).await.unwrap();
        assert_eq!(registry.resolve(&token).await.unwrap(), Some(dest));

        assert!(registry.invalidate(&token).await.unwrap());
        assert!(!registry.invalidate(&token).await.unwrap());
        assert_eq!(registry.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let registry = InMemoryCallbackRegistry::new();
        let a = registry
            .register(CallbackDestination::new("x"))
            .await
            .unwrap();
        let b = registry
            .register(CallbackDestination::new("x"))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let registry = InMemoryCallbackRegistry::new();
        assert!(registry
            .register(CallbackDestination::new(" "))
            .await
            .is_err());
    }
}
