//! Payment provider trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// A payment intent created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Provider-assigned intent id, used to correlate webhooks.
    pub id: String,
    /// Secret the client uses to confirm the payment.
    pub client_secret: String,
}

/// Errors reported by a payment provider.
#[derive(Debug, Error)]
pub enum PaymentProviderError {
    #[error("Payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("Payment provider unreachable: {0}")]
    Unavailable(String),
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a payment intent for `amount_cents` in `currency`.
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentProviderError>;

    /// Fetches an intent created earlier, including its client secret.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentProviderError>;
}

#[derive(Debug, Clone)]
struct RecordedIntent {
    client_secret: String,
    amount_cents: i64,
    currency: String,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    intents: HashMap<String, RecordedIntent>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory payment provider for development and testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to reject subsequent create calls.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = fail;
    }

    pub fn intent_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .len()
    }

    /// Amount and currency recorded for an intent.
    pub fn charged(&self, intent_id: &str) -> Option<(i64, String)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .get(intent_id)
            .map(|i| (i.amount_cents, i.currency.clone()))
    }

    pub fn metadata(&self, intent_id: &str) -> Option<HashMap<String, String>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .get(intent_id)
            .map(|i| i.metadata.clone())
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentProviderError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_create {
            return Err(PaymentProviderError::Rejected("Card declined".to_string()));
        }

        state.next_id += 1;
        let id = format!("pi_{:06}", state.next_id);
        let client_secret = format!("{id}_secret_{}", Uuid::new_v4().simple());
        state.intents.insert(
            id.clone(),
            RecordedIntent {
                client_secret: client_secret.clone(),
                amount_cents,
                currency: currency.to_string(),
                metadata,
            },
        );

        Ok(PaymentIntent { id, client_secret })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentProviderError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .intents
            .get(intent_id)
            .map(|recorded| PaymentIntent {
                id: intent_id.to_string(),
                client_secret: recorded.client_secret.clone(),
            })
            .ok_or_else(|| PaymentProviderError::Rejected(format!("No such payment intent: {intent_id}")))
    }
}
