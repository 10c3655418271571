// src/services/cache.rs
use crate::models::{CacheKey, CalculationOperation, CalculationRequest, CalculationResult, EngineRequest};
use crate::services::db::CalculationStore;
use crate::services::rate_engine::RateEngine;
use log::{debug, error, info, warn};
use std::sync::Arc;

const SERIALIZATION_FAILURE_PAYLOAD: &str =
    r#"{"error":"Failed to serialize calculation result for cache entry"}"#;

/// Read-through memo of calculation results.
///
/// The key is `(amount, horizon)` only: a future-value request and a
/// monthly-contribution request with the same number and horizon share an
/// entry. The earliest entry for a key is canonical. There is no locking
/// between lookup and append, so concurrent misses may each call the engine
/// and each append a row.
pub struct CalculationCache {
    store: Arc<dyn CalculationStore>,
}

impl CalculationCache {
    pub fn new(store: Arc<dyn CalculationStore>) -> Self {
        CalculationCache { store }
    }

    pub fn key_for(request: &CalculationRequest) -> CacheKey {
        CacheKey {
            amount: request.amount,
            horizon_years: request.horizon_years,
        }
    }

    /// Result held by the earliest entry for `key`. Store failures, corrupt
    /// payloads and cached errors all read as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<CalculationResult> {
        let entries = match self.store.find_entries(key).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to read calculation cache for {}: {}", key, e);
                return None;
            }
        };
        let source = entries.first()?;

        match serde_json::from_str::<CalculationResult>(&source.payload) {
            Ok(result) if result.is_success() => {
                debug!("Found calculation in cache for {} (entry {})", key, source.id);
                Some(result)
            }
            Ok(_) => {
                warn!("Cached calculation {} itself contained an error. Recalculating.", source.id);
                None
            }
            Err(e) => {
                warn!("Failed to deserialize cached calculation {}: {}. Recalculating.", source.id, e);
                None
            }
        }
    }

    /// Appends a successful result. Errored results are not cached.
    pub async fn put(&self, key: CacheKey, operation: CalculationOperation, result: &CalculationResult) {
        if !result.is_success() {
            debug!("Not caching errored calculation for {}", key);
            return;
        }
        let payload = serde_json::to_string(result).unwrap_or_else(|e| {
            warn!("Failed to serialize calculation result for {}: {}", key, e);
            SERIALIZATION_FAILURE_PAYLOAD.to_string()
        });
        if let Err(e) = self.store.append_entry(key, operation, payload).await {
            // The fresh result is still returned to the caller.
            error!("Failed to store calculation for {}: {}", key, e);
        }
    }

    pub async fn get_or_compute(
        &self,
        request: &CalculationRequest,
        engine: &dyn RateEngine,
    ) -> CalculationResult {
        let key = Self::key_for(request);
        if let Some(hit) = self.get(&key).await {
            return hit;
        }

        info!(
            "Calculation not found in cache. Calling rate engine for operation {} for {}",
            request.operation, key
        );
        let response = engine.compute(&EngineRequest::for_calculation(request)).await;
        let result = CalculationResult::from(response);
        self.put(key, request.operation, &result).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngineResponse, PrimaryResult};
    use crate::services::db::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays queued responses and counts calls.
    struct ScriptedEngine {
        responses: Mutex<Vec<EngineResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn new(mut responses: Vec<EngineResponse>) -> Self {
            responses.reverse();
            ScriptedEngine {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateEngine for ScriptedEngine {
        async fn compute(&self, _request: &EngineRequest) -> EngineResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().pop().unwrap_or_default()
        }
    }

    fn sip_response(sip: rust_decimal::Decimal) -> EngineResponse {
        EngineResponse {
            calculated_best_weighted_annual_rate: Some("12%".to_string()),
            monthly_sip_required_best_weighted_case: Some(sip),
            ..Default::default()
        }
    }

    fn request(operation: CalculationOperation) -> CalculationRequest {
        CalculationRequest {
            operation,
            horizon_years: 3,
            amount: dec!(50000),
        }
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = CalculationCache::new(store.clone());
        let engine = ScriptedEngine::new(vec![sip_response(dec!(1150.37))]);

        let first = cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;
        let second = cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;

        assert_eq!(engine.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn different_operation_with_same_amount_and_horizon_collides() {
        let cache = CalculationCache::new(Arc::new(MemoryStore::new()));
        let engine = ScriptedEngine::new(vec![
            sip_response(dec!(1150.37)),
            EngineResponse {
                calculated_future_value: Some(dec!(2175382.35)),
                ..Default::default()
            },
        ]);

        let first = cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;
        let second = cache.get_or_compute(&request(CalculationOperation::FutureValueFromSip), &engine).await;

        assert_eq!(engine.calls(), 1);
        assert_eq!(second, first);
        assert_eq!(second.primary, Some(PrimaryResult::RequiredMonthlySip(dec!(1150.37))));
    }

    #[tokio::test]
    async fn corrupt_earliest_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let key = CacheKey {
            amount: dec!(50000),
            horizon_years: 3,
        };
        store
            .append_entry(key, CalculationOperation::SipFromFutureValue, "{not json".to_string())
            .await
            .unwrap();
        let cache = CalculationCache::new(store.clone());
        let engine = ScriptedEngine::new(vec![sip_response(dec!(1150.37)), sip_response(dec!(1150.37))]);

        let result = cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;
        assert_eq!(result.required_monthly_sip(), Some(dec!(1150.37)));
        assert_eq!(engine.calls(), 1);
        assert_eq!(store.entry_count(), 2);

        // The corrupt row stays canonical, so the next call recomputes too.
        cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn cached_error_payload_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let key = CacheKey {
            amount: dec!(50000),
            horizon_years: 3,
        };
        store
            .append_entry(key, CalculationOperation::SipFromFutureValue, SERIALIZATION_FAILURE_PAYLOAD.to_string())
            .await
            .unwrap();
        let cache = CalculationCache::new(store);

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn engine_errors_are_returned_but_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = CalculationCache::new(store.clone());
        let engine = ScriptedEngine::new(vec![
            EngineResponse {
                error: Some("Rate engine internal server error.".to_string()),
                details: Some("500 Internal Server Error: boom".to_string()),
                ..Default::default()
            },
            sip_response(dec!(1150.37)),
        ]);

        let failed = cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;
        assert_eq!(failed.error.as_deref(), Some("Rate engine internal server error."));
        assert_eq!(store.entry_count(), 0);

        let retried = cache.get_or_compute(&request(CalculationOperation::SipFromFutureValue), &engine).await;
        assert!(retried.is_success());
        assert_eq!(engine.calls(), 2);
        assert_eq!(store.entry_count(), 1);
    }
}
