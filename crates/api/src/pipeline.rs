//! Repayment quote polling.
//!
//! A [`QuotePipeline`] runs two independent polls, the liquidity probe
//! (indicative) and the firm quote, each as its own task publishing through a
//! `watch` channel. Setting an identical request is a no-op, so each poll has
//! at most one request in flight per key. A failed fetch records its error
//! but keeps the last successful route.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::denylist::Denylist;
use crate::router::{QuoteRequest, RepaymentRoute, RouterQuoter};

/// Which poll a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    Indicative,
    Firm,
}

/// Latest result of a poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteState {
    /// Request that produced `route`
    pub request: Option<QuoteRequest>,
    pub route: Option<RepaymentRoute>,
    /// Error of the most recent fetch, cleared by the next success
    pub last_error: Option<String>,
    pub fetching: bool,
}

impl QuoteState {
    /// The route if it answers `request` and its tool is not denied.
    pub fn route_for(&self, request: &QuoteRequest, denylist: &Denylist) -> Option<&RepaymentRoute> {
        match (&self.request, &self.route) {
            (Some(answered), Some(route)) if answered == request && !denylist.contains(&route.tool) => Some(route),
            _ => None,
        }
    }
}

struct QuotePoll {
    request_tx: watch::Sender<Option<QuoteRequest>>,
    state_rx: watch::Receiver<QuoteState>,
    refresh: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl QuotePoll {
    fn spawn(
        kind: QuoteKind,
        quoter: Arc<dyn RouterQuoter>,
        denylist: Arc<RwLock<Denylist>>,
        interval: Duration,
    ) -> Self {
        let (request_tx, request_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(QuoteState::default());
        let refresh = Arc::new(Notify::new());
        let handle = tokio::spawn(run_poll(
            kind,
            quoter,
            denylist,
            interval,
            request_rx,
            state_tx,
            Arc::clone(&refresh),
        ));
        Self {
            request_tx,
            state_rx,
            refresh,
            handle,
        }
    }

    fn set(&self, request: Option<QuoteRequest>) {
        self.request_tx.send_if_modified(|current| {
            if *current == request {
                false
            } else {
                *current = request;
                true
            }
        });
    }
}

impl Drop for QuotePoll {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn fetch(
    kind: QuoteKind,
    quoter: &dyn RouterQuoter,
    request: &QuoteRequest,
    deny: &[String],
) -> crate::error::Result<RepaymentRoute> {
    match kind {
        QuoteKind::Indicative => quoter.quote_indicative(request, deny).await,
        QuoteKind::Firm => quoter.quote_firm(request, deny).await,
    }
}

async fn run_poll(
    kind: QuoteKind,
    quoter: Arc<dyn RouterQuoter>,
    denylist: Arc<RwLock<Denylist>>,
    interval: Duration,
    mut request_rx: watch::Receiver<Option<QuoteRequest>>,
    state_tx: watch::Sender<QuoteState>,
    refresh: Arc<Notify>,
) {
    loop {
        let request = request_rx.borrow_and_update().clone();
        if let Some(request) = request {
            let deny = denylist.read().await.to_vec();
            state_tx.send_modify(|s| s.fetching = true);
            debug!(?kind, amount = %request.amount, denied = deny.len(), "polling quote");

            match fetch(kind, quoter.as_ref(), &request, &deny).await {
                Ok(route) => {
                    debug!(?kind, tool = %route.tool, to_amount = %route.to_amount, "quote received");
                    state_tx.send_modify(|s| {
                        s.request = Some(request);
                        s.route = Some(route);
                        s.last_error = None;
                        s.fetching = false;
                    });
                }
                Err(e) => {
                    warn!(?kind, error = %e, "quote failed, keeping last route");
                    state_tx.send_modify(|s| {
                        s.last_error = Some(e.to_string());
                        s.fetching = false;
                    });
                }
            }
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = refresh.notified() => {}
            changed = request_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// The liquidity probe and firm quote polls of one session.
pub struct QuotePipeline {
    probe: QuotePoll,
    firm: QuotePoll,
}

impl QuotePipeline {
    /// Spawns both polls on the current runtime.
    pub fn spawn(quoter: Arc<dyn RouterQuoter>, denylist: Arc<RwLock<Denylist>>, interval: Duration) -> Self {
        Self {
            probe: QuotePoll::spawn(
                QuoteKind::Indicative,
                Arc::clone(&quoter),
                Arc::clone(&denylist),
                interval,
            ),
            firm: QuotePoll::spawn(QuoteKind::Firm, quoter, denylist, interval),
        }
    }

    /// Sets or disables the liquidity probe.
    pub fn set_probe(&self, request: Option<QuoteRequest>) {
        self.probe.set(request);
    }

    /// Sets or disables the firm quote.
    pub fn set_firm(&self, request: Option<QuoteRequest>) {
        self.firm.set(request);
    }

    pub fn probe(&self) -> QuoteState {
        self.probe.state_rx.borrow().clone()
    }

    pub fn firm(&self) -> QuoteState {
        self.firm.state_rx.borrow().clone()
    }

    pub fn subscribe(&self, kind: QuoteKind) -> watch::Receiver<QuoteState> {
        match kind {
            QuoteKind::Indicative => self.probe.state_rx.clone(),
            QuoteKind::Firm => self.firm.state_rx.clone(),
        }
    }

    /// Refetches both quotes now instead of at the next tick.
    pub fn refresh(&self) {
        self.probe.refresh.notify_one();
        self.firm.refresh.notify_one();
    }

    /// Stops both polls. Later state is frozen.
    pub fn shutdown(&self) {
        self.probe.handle.abort();
        self.firm.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, Result};
    use alloy_primitives::{Address, Bytes, U256};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedQuoter {
        calls: AtomicUsize,
        fail_after: Option<usize>,
        denied: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedQuoter {
        fn respond(&self, request: &QuoteRequest, deny: &[String]) -> Result<RepaymentRoute> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.denied.lock().unwrap().push(deny.to_vec());
            if self.fail_after.is_some_and(|n| call >= n) {
                return Err(ApiError::QuoteUnavailable("no route".to_string()));
            }
            Ok(RepaymentRoute {
                from_amount: request.amount,
                to_amount: request.amount,
                call_data: Bytes::from(vec![1]),
                tool: "paraswap".to_string(),
                to: Address::repeat_byte(0x55),
                value: U256::ZERO,
                gas_limit: None,
                chain_id: 10,
            })
        }
    }

    #[async_trait]
    impl RouterQuoter for ScriptedQuoter {
        async fn quote_indicative(&self, request: &QuoteRequest, deny: &[String]) -> Result<RepaymentRoute> {
            self.respond(request, deny)
        }

        async fn quote_firm(&self, request: &QuoteRequest, deny: &[String]) -> Result<RepaymentRoute> {
            self.respond(request, deny)
        }
    }

    fn request(amount: u64) -> QuoteRequest {
        QuoteRequest {
            from_token: Address::repeat_byte(1),
            to_token: Address::repeat_byte(2),
            amount: U256::from(amount),
            from_address: Address::repeat_byte(3),
            to_address: Address::repeat_byte(3),
        }
    }

    const LONG: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_identical_requests_fetch_once() {
        let quoter = Arc::new(ScriptedQuoter::default());
        let pipeline = QuotePipeline::spawn(quoter.clone(), Arc::default(), LONG);

        pipeline.set_firm(Some(request(100)));
        let mut rx = pipeline.subscribe(QuoteKind::Firm);
        rx.wait_for(|s| s.route.is_some()).await.unwrap();

        pipeline.set_firm(Some(request(100)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(quoter.calls.load(Ordering::SeqCst), 1);

        pipeline.set_firm(Some(request(200)));
        rx.wait_for(|s| s.request == Some(request(200))).await.unwrap();
        assert_eq!(quoter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_successful_route() {
        let quoter = Arc::new(ScriptedQuoter {
            fail_after: Some(1),
            ..ScriptedQuoter::default()
        });
        let pipeline = QuotePipeline::spawn(quoter.clone(), Arc::default(), LONG);
        let mut rx = pipeline.subscribe(QuoteKind::Indicative);

        pipeline.set_probe(Some(request(100)));
        rx.wait_for(|s| s.route.is_some()).await.unwrap();

        pipeline.refresh();
        rx.wait_for(|s| s.last_error.is_some()).await.unwrap();

        let state = pipeline.probe();
        assert_eq!(state.route.map(|r| r.to_amount), Some(U256::from(100u64)));
        assert_eq!(state.request, Some(request(100)));
    }

    #[tokio::test]
    async fn test_polls_on_interval() {
        let quoter = Arc::new(ScriptedQuoter::default());
        let pipeline = QuotePipeline::spawn(quoter.clone(), Arc::default(), Duration::from_millis(10));
        pipeline.set_probe(Some(request(1)));

        tokio::time::timeout(Duration::from_secs(5), async {
            while quoter.calls.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        // the firm poll never ran
        assert!(pipeline.firm().route.is_none());
    }

    #[tokio::test]
    async fn test_denylist_is_sent_with_requests() {
        let quoter = Arc::new(ScriptedQuoter::default());
        let denylist: Arc<RwLock<Denylist>> = Arc::default();
        let pipeline = QuotePipeline::spawn(quoter.clone(), Arc::clone(&denylist), LONG);
        let mut rx = pipeline.subscribe(QuoteKind::Firm);

        pipeline.set_firm(Some(request(100)));
        rx.wait_for(|s| s.route.is_some()).await.unwrap();

        denylist.write().await.insert("paraswap");
        pipeline.refresh();
        tokio::time::timeout(Duration::from_secs(5), async {
            while quoter.calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let denied = quoter.denied.lock().unwrap().clone();
        assert!(denied[0].is_empty());
        assert_eq!(denied[1], vec!["paraswap".to_string()]);
    }

    #[test]
    fn test_route_for_requires_matching_request_and_allowed_tool() {
        let mut state = QuoteState {
            request: Some(request(100)),
            route: ScriptedQuoter::default().respond(&request(100), &[]).ok(),
            ..QuoteState::default()
        };
        let mut denylist = Denylist::new();
        assert!(state.route_for(&request(100), &denylist).is_some());
        assert!(state.route_for(&request(101), &denylist).is_none());

        denylist.insert("paraswap");
        assert!(state.route_for(&request(100), &denylist).is_none());

        state.route = None;
        assert!(state.route_for(&request(100), &Denylist::new()).is_none());
    }
}
