use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use salvo::http::{Method, StatusCode};
use salvo::prelude::*;
use serde::Deserialize;

use crate::matrix::MatrixEvent;
use crate::{AppResult, EmptyObject, MatrixError, state};

/// Entries older than this are swept from the dedup map.
const PROCESSED_TXN_TTL: Duration = Duration::from_secs(60 * 60);
/// Every N-th receipt kicks off a background sweep.
const SWEEP_EVERY: u64 = 64;

/// One application-service delivery.
#[derive(Debug, Default, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub events: Vec<MatrixEvent>,
}

/// Transaction-id dedup: the homeserver retries deliveries, and a retried
/// transaction must be acknowledged without reprocessing.
#[derive(Default)]
pub struct TransactionDedup {
    seen: Arc<Mutex<HashMap<String, Instant>>>,
    receipts: AtomicU64,
}

impl TransactionDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn already_processed(&self, txn_id: &str) -> bool {
        self.seen
            .lock()
            .expect("dedup mutex poisoned")
            .contains_key(txn_id)
    }

    /// Records the receipt and occasionally sweeps expired entries off the
    /// request path.
    pub fn mark(&self, txn_id: &str) {
        self.seen
            .lock()
            .expect("dedup mutex poisoned")
            .insert(txn_id.to_owned(), Instant::now());
        let receipts = self.receipts.fetch_add(1, Ordering::Relaxed) + 1;
        if receipts % SWEEP_EVERY == 0 {
            let seen = self.seen.clone();
            tokio::spawn(async move {
                let mut map = seen.lock().expect("dedup mutex poisoned");
                let before = map.len();
                map.retain(|_, received| received.elapsed() < PROCESSED_TXN_TTL);
                debug!(purged = before - map.len(), "swept processed transactions");
            });
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("dedup mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `PUT /_matrix/app/v1/transactions/{txn_id}`. Duplicates acknowledge
/// immediately; per-event errors are logged and never fail the batch, since
/// a homeserver retry would amplify duplicates.
#[handler]
pub async fn receive_transaction(req: &mut Request, res: &mut Response) -> AppResult<()> {
    if req.method() != Method::PUT {
        res.status_code(StatusCode::METHOD_NOT_ALLOWED);
        return Ok(());
    }
    let txn_id = req.param::<String>("txn_id").unwrap_or_default();
    if txn_id.is_empty() {
        return Err(MatrixError::invalid_param("missing transaction id").into());
    }
    let state = state::get();
    if state.transactions.already_processed(&txn_id) {
        debug!(txn_id, "duplicate transaction acknowledged");
        res.render(Json(EmptyObject {}));
        return Ok(());
    }

    let transaction: Transaction = req
        .parse_json()
        .await
        .map_err(|e| MatrixError::bad_json(format!("malformed transaction body: {e}")))?;
    state.transactions.mark(&txn_id);

    for event in &transaction.events {
        if let Err(e) = state.mx_to_mm.handle_event(event).await {
            error!(txn_id, event_id = %event.event_id, error = %e, "handling event failed");
        }
    }
    res.render(Json(EmptyObject {}));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_transactions_are_detected() {
        let dedup = TransactionDedup::new();
        assert!(!dedup.already_processed("t1"));
        dedup.mark("t1");
        assert!(dedup.already_processed("t1"));
        assert!(!dedup.already_processed("t2"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn transaction_body_parses_events() {
        let txn: Transaction = serde_json::from_str(
            r#"{"events": [{"type": "m.room.message", "event_id": "$e", "sender": "@a:x"}]}"#,
        )
        .unwrap();
        assert_eq!(txn.events.len(), 1);
        assert_eq!(txn.events[0].event_type, "m.room.message");

        let empty: Transaction = serde_json::from_str("{}").unwrap();
        assert!(empty.events.is_empty());
    }
}
