//! Record of processed inbound message ids.
//!
//! Transports redeliver messages. A message id is recorded only after its
//! event was fully processed, so a redelivery after a failure is processed
//! again while a redelivery after success is dropped.

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Default)]
pub struct DeliveryLedger {
    delivered: scc::HashMap<(String, String), DateTime<Utc>>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, identity: &str, message_id: &str) -> bool {
        let key = (identity.to_string(), message_id.to_string());
        self.delivered.read_async(&key, |_, _| ()).await.is_some()
    }

    pub async fn record(&self, identity: &str, message_id: &str) {
        let key = (identity.to_string(), message_id.to_string());
        let _ = self.delivered.upsert_async(key, Utc::now()).await;
    }

    /// Forgets ids recorded more than `retention` ago.
    pub async fn prune_expired(&self, retention: TimeDelta) -> usize {
        let cutoff = Utc::now() - retention;
        let before = self.delivered.len();
        self.delivered
            .retain_async(|_, recorded_at| *recorded_at >= cutoff)
            .await;
        before.saturating_sub(self.delivered.len())
    }

    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_contains() {
        let ledger = DeliveryLedger::new();
        assert!(!ledger.contains("u1", "m1").await);

        ledger.record("u1", "m1").await;
        assert!(ledger.contains("u1", "m1").await);
        // Ids are scoped per identity
        assert!(!ledger.contains("u2", "m1").await);
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let ledger = DeliveryLedger::new();
        ledger.record("u1", "m1").await;

        assert_eq!(ledger.prune_expired(TimeDelta::hours(1)).await, 0);
        assert_eq!(ledger.len(), 1);

        assert_eq!(ledger.prune_expired(TimeDelta::seconds(-1)).await, 1);
        assert!(ledger.is_empty());
    }
}
