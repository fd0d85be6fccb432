// Exclusive - one-unit-at-a-time execution context

mod handle;
mod settle;

pub use handle::RunHandle;

use crate::application::registry::ContextRegistry;
use crate::domain::{ContextKey, FetchRequest, FetchResponse};
use crate::port::{FetchError, Fetcher};
use futures::FutureExt;
use settle::{settle_signal, Settled};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Label used in logs for contexts without a key
const ANONYMOUS: &str = "<anonymous>";

/// Serializes async work: each unit submitted through [`run`](Exclusive::run)
/// starts only after every unit submitted before it has settled.
///
/// `Exclusive` is a cheap handle; clones share one chain. Distinct instances
/// never wait on each other.
///
/// ```text
/// let context = Exclusive::new();
///
/// // execution time
/// context.run(wait3s);  // |---|
/// context.run(wait3s);  //     |---|
/// context.run(wait3s);  //         |---|
/// ```
#[derive(Clone)]
pub struct Exclusive {
    inner: Arc<Inner>,
}

struct Inner {
    key: Option<ContextKey>,
    chain: Mutex<Chain>,
    pending: Arc<AtomicUsize>,
}

#[derive(Default)]
struct Chain {
    /// Settles once the most recently submitted unit has settled
    tail: Option<Settled>,
    next_seq: u64,
}

impl Exclusive {
    /// Create an anonymous context with an empty chain
    pub fn new() -> Self {
        Self::with_key(None)
    }

    /// Create a context and register it under `key`, replacing any context
    /// previously registered there
    pub fn named(registry: &ContextRegistry, key: &ContextKey) -> Self {
        registry.register(key)
    }

    pub(crate) fn with_key(key: Option<ContextKey>) -> Self {
        Self {
            inner: Arc::new(Inner {
                key,
                chain: Mutex::new(Chain::default()),
                pending: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Key this context was created under, if any
    pub fn key(&self) -> Option<&ContextKey> {
        self.inner.key.as_ref()
    }

    /// Units submitted but not yet settled
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Whether two handles share one chain
    pub fn same_context(a: &Exclusive, b: &Exclusive) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Submit `task` to run after everything submitted so far has settled
    ///
    /// The position in the chain is taken synchronously, at call time. The
    /// returned handle resolves with exactly the task's output; a failing
    /// task (an `Err` output or a panic) reaches only this caller and the
    /// chain moves on to the next unit regardless.
    ///
    /// # Panics
    /// - If called outside a tokio runtime
    pub fn run<F, Fut, T>(&self, task: F) -> RunHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (advance, settled) = settle_signal(Arc::clone(&self.inner.pending));
        let (prior, seq) = {
            let mut chain = self
                .inner
                .chain
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let seq = chain.next_seq;
            chain.next_seq += 1;
            (chain.tail.replace(settled), seq)
        };

        let context = self.label().to_string();
        let (result_tx, result_rx) = oneshot::channel();

        debug!(context = %context, seq, "Unit queued");

        tokio::spawn(async move {
            if let Some(prior) = prior {
                prior.wait().await;
            }
            debug!(context = %context, seq, "Unit started");

            let outcome = AssertUnwindSafe(async move { task().await })
                .catch_unwind()
                .await;
            if outcome.is_err() {
                warn!(context = %context, seq, "Unit panicked");
            }

            // Caller hears about the outcome before the next unit may start
            let _ = result_tx.send(outcome);
            advance.settle();

            debug!(context = %context, seq, "Unit settled");
        });

        RunHandle::new(result_rx)
    }

    /// Perform one retrieval through `fetcher`, serialized like any other unit
    pub fn fetch(
        &self,
        fetcher: Arc<dyn Fetcher>,
        request: FetchRequest,
    ) -> RunHandle<Result<FetchResponse, FetchError>> {
        self.run(move || async move { fetcher.fetch(request).await })
    }

    /// Resolves once every unit submitted before this call has settled
    pub fn settled(&self) -> RunHandle<()> {
        self.run(|| async {})
    }

    fn label(&self) -> &str {
        self.inner
            .key
            .as_ref()
            .map(ContextKey::as_str)
            .unwrap_or(ANONYMOUS)
    }
}

impl Default for Exclusive {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Exclusive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exclusive")
            .field("key", &self.inner.key)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::fetcher::mocks::{MockBehavior, MockFetcher};
    use tokio::time::{sleep, Duration, Instant};
    use tokio_test::{assert_err, assert_ok, assert_pending};

    type Spans = Arc<Mutex<Vec<(usize, Instant, Instant)>>>;

    fn timed(spans: &Spans, id: usize, ms: u64) -> impl Future<Output = usize> + Send + 'static {
        let spans = Arc::clone(spans);
        async move {
            let start = Instant::now();
            sleep(Duration::from_millis(ms)).await;
            spans.lock().unwrap().push((id, start, Instant::now()));
            id
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_units_run_in_submission_order() {
        let context = Exclusive::new();
        let spans: Spans = Arc::default();

        // Later units are shorter; completion order must still follow call order
        let h1 = context.run({
            let f = timed(&spans, 1, 30);
            move || f
        });
        let h2 = context.run({
            let f = timed(&spans, 2, 10);
            move || f
        });
        let h3 = context.run({
            let f = timed(&spans, 3, 20);
            move || f
        });

        assert_eq!((h1.await, h2.await, h3.await), (1, 2, 3));

        let spans = spans.lock().unwrap();
        let ids: Vec<usize> = spans.iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(spans[1].1 >= spans[0].2, "unit 2 started before unit 1 settled");
        assert!(spans[2].1 >= spans[1].2, "unit 3 started before unit 2 settled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_block_or_skip_next_unit() {
        let context = Exclusive::new();

        let h1 = context.run(|| async {
            sleep(Duration::from_millis(10)).await;
            Err::<u32, String>("boom".to_string())
        });
        let h2 = context.run(|| async { Ok::<u32, String>(2) });

        assert_eq!(assert_err!(h1.await), "boom");
        assert_eq!(assert_ok!(h2.await), 2);
    }

    #[tokio::test]
    async fn test_panic_reaches_only_its_caller() {
        let context = Exclusive::new();

        let h1 = context.run(|| async {
            panic!("unit exploded");
        });
        let h2 = context.run(|| async { "still runs" });

        let joined = tokio::spawn(h1).await;
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(h2.await, "still runs");
    }

    #[tokio::test]
    async fn test_queued_unit_waits_for_prior_to_settle() {
        let context = Exclusive::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let h1 = context.run(move || async move {
            let _ = release_rx.await;
            "first"
        });
        let mut h2 = context.run(|| async { "second" });

        tokio::task::yield_now().await;
        assert_pending!(futures::poll!(&mut h2));
        assert_eq!(context.pending(), 2);

        release_tx.send(()).unwrap();
        assert_eq!(h1.await, "first");
        assert_eq!(h2.await, "second");
    }

    #[tokio::test]
    async fn test_result_delivered_while_later_units_queued() {
        let context = Exclusive::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let h1 = context.run(|| async { 7 });
        let h2 = context.run(move || async move {
            let _ = release_rx.await;
            8
        });
        let h3 = context.run(|| async { 9 });

        assert_eq!(h1.await, 7);
        assert_eq!(context.pending(), 2);

        release_tx.send(()).unwrap();
        assert_eq!((h2.await, h3.await), (8, 9));
    }

    #[tokio::test]
    async fn test_caller_sees_result_before_next_unit_starts() {
        use std::sync::atomic::AtomicBool;

        let context = Exclusive::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let delivered = Arc::new(AtomicBool::new(false));

        let h1 = context.run(move || async move {
            let _ = release_rx.await;
            1
        });
        let seen = Arc::clone(&delivered);
        let h2 = context.run(move || async move { seen.load(Ordering::SeqCst) });

        // Caller of unit 1 waits on its handle in a task of its own
        let flag = Arc::clone(&delivered);
        let caller = tokio::spawn(async move {
            let value = h1.await;
            flag.store(true, Ordering::SeqCst);
            value
        });

        // Let the caller and both drivers park on their signals
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        release_tx.send(()).unwrap();

        assert!(h2.await, "unit 2 started before unit 1's caller had its result");
        assert_eq!(caller.await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_contexts_do_not_block_each_other() {
        let a = Exclusive::new();
        let b = Exclusive::new();

        let slow = a.run(|| async {
            sleep(Duration::from_secs(60)).await;
            Instant::now()
        });
        let quick = b.run(|| async { Instant::now() });

        let quick_done = quick.await;
        let slow_done = slow.await;
        assert!(quick_done < slow_done);
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel_unit() {
        let context = Exclusive::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        context
            .run(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .detach();

        context.settled().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(context.pending(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_one_chain() {
        let context = Exclusive::new();
        let clone = context.clone();
        assert!(Exclusive::same_context(&context, &clone));
        assert!(!Exclusive::same_context(&context, &Exclusive::new()));

        let log = Arc::new(Mutex::new(Vec::new()));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let l1 = Arc::clone(&log);
        let h1 = context.run(move || async move {
            let _ = release_rx.await;
            l1.lock().unwrap().push("original");
        });
        let l2 = Arc::clone(&log);
        let h2 = clone.run(move || async move {
            l2.lock().unwrap().push("clone");
        });

        release_tx.send(()).unwrap();
        h1.await;
        h2.await;
        assert_eq!(*log.lock().unwrap(), vec!["original", "clone"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_is_serialized() {
        let fetcher = Arc::new(
            MockFetcher::new_ok()
                .with_route("https://example.com/down", MockBehavior::Fail("refused".into()))
                .with_latency(Duration::from_millis(50)),
        );
        let context = Exclusive::new();

        let urls = [
            "https://example.com/a",
            "https://example.com/down",
            "https://example.com/b",
        ];
        let handles: Vec<_> = urls
            .into_iter()
            .map(|url| context.fetch(fetcher.clone(), FetchRequest::get(url)))
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await);
        }

        assert_eq!(results[0].as_ref().unwrap().status, 200);
        assert_eq!(
            results[1].as_ref().unwrap_err(),
            &FetchError::Transport("refused".to_string())
        );
        assert!(results[2].is_ok());
        assert_eq!(fetcher.max_in_flight(), 1);
        assert_eq!(fetcher.calls(), urls);
        assert_eq!(fetcher.call_count(), 3);
    }

    #[test]
    fn test_debug_shows_key() {
        let context = Exclusive::with_key(Some(ContextKey::parse("sample").unwrap()));
        let rendered = format!("{:?}", context);
        assert!(rendered.contains("sample"));
        assert_eq!(context.label(), "sample");
        assert_eq!(Exclusive::new().label(), ANONYMOUS);
    }
}
