use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tollgate_budget::BudgetLedger;
use tollgate_cache::LayeredCache;
use tollgate_core::{
    AdmissionDecision, GateRequest, ProviderBackend, ProviderReply, TollgateError,
};
use tollgate_router::{ExecutionRouter, ModelLadder, ModelTier, RouterConfig};
use tollgate_store::InMemoryStore;

/// Provider that answers slowly and counts its calls, so concurrent
/// requests overlap while one execution is in flight.
struct SlowCountingProvider {
    calls: AtomicUsize,
    fail: bool,
}

impl SlowCountingProvider {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderBackend for SlowCountingProvider {
    async fn execute(
        &self,
        _model_id: &str,
        payload: &str,
    ) -> Result<ProviderReply, TollgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        if self.fail {
            return Err(TollgateError::Provider("unavailable".to_string()));
        }
        Ok(ProviderReply {
            text: format!("answer to the question about {payload} in full detail."),
            cost_usd: 0.01,
        })
    }
}

fn router(provider: Arc<SlowCountingProvider>, max_attempts: u32) -> Arc<ExecutionRouter> {
    let cache = Arc::new(LayeredCache::with_standard_tiers(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryStore::new()),
    ));
    let ledger = Arc::new(BudgetLedger::new(
        Arc::new(InMemoryStore::new()),
        100.0,
        Duration::from_secs(3600),
    ));
    let ladder = ModelLadder::new(vec![ModelTier::new("compact", 0.002)]).unwrap();
    Arc::new(ExecutionRouter::new(
        provider,
        cache,
        ledger,
        ladder,
        RouterConfig {
            max_attempts,
            ..RouterConfig::default()
        },
    ))
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_provider_call() {
    let provider = Arc::new(SlowCountingProvider::new(false));
    let router = router(provider.clone(), 3);
    let request = GateRequest::cheap("single flight question");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = router.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            router
                .execute(&request, &AdmissionDecision::allow("within budget"))
                .await
        }));
    }

    let outcomes: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(provider.call_count(), 1);
    let first = &outcomes[0];
    assert!(outcomes.iter().all(|o| o.output == first.output));
}

#[tokio::test]
async fn different_fingerprints_do_not_coalesce() {
    let provider = Arc::new(SlowCountingProvider::new(false));
    let router = router(provider.clone(), 3);

    let a = GateRequest::cheap("question a");
    let b = GateRequest::cheap("question b");

    let decision = AdmissionDecision::allow("within budget");
    let (ra, rb) = tokio::join!(
        router.execute(&a, &decision),
        router.execute(&b, &decision),
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn failure_fans_out_to_every_waiter() {
    let provider = Arc::new(SlowCountingProvider::new(true));
    let router = router(provider.clone(), 1);
    let request = GateRequest::cheap("doomed question");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let router = router.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            router
                .execute(&request, &AdmissionDecision::allow("within budget"))
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    assert_eq!(provider.call_count(), 1);
    for joined in results {
        assert!(joined.unwrap().is_err());
    }
}

#[tokio::test]
async fn a_later_request_after_completion_executes_again() {
    let provider = Arc::new(SlowCountingProvider::new(false));
    let router = router(provider.clone(), 3);
    let request = GateRequest::cheap("repeat question");

    router
        .execute(&request, &AdmissionDecision::allow("within budget"))
        .await
        .unwrap();
    router
        .execute(&request, &AdmissionDecision::allow("within budget"))
        .await
        .unwrap();

    // No longer in flight, so a second Allow is a second call. Avoiding it
    // is the cache's job, one layer up.
    assert_eq!(provider.call_count(), 2);
}
