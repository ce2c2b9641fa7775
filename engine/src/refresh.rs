use crate::resolve::GroupResolutionEngine;
use crate::resolve::Resolution;
use grouptabs_groups::Group;
use grouptabs_groups::ResolveError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::debug;
use tracing::warn;

/// The view half of the refresh contract. `apply` receives a freshly
/// resolved group off the worker; marshalling it onto the interactive
/// thread is the host's responsibility and must stay cheap.
pub trait TabView: Send + Sync + 'static {
    /// Whether this view is the currently selected one. Refreshing an
    /// unselected split corrupts scroll position in the surrounding
    /// widget, so its requests are deferred instead.
    fn is_selected(&self) -> bool;

    /// What the view currently displays, if anything.
    fn displayed(&self) -> Option<Resolution>;

    fn apply(&self, resolution: Resolution);
}

/// One coalesced unit of refresh work for a view.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub file: PathBuf,
    pub requested: Option<Group>,
    /// Re-derive from scratch even when the result looks unchanged.
    pub force: bool,
    /// Ask for a provisional (stub) resolution.
    pub stub: bool,
}

impl RefreshRequest {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            requested: None,
            force: false,
            stub: false,
        }
    }

    pub fn with_requested(mut self, group: Group) -> Self {
        self.requested = Some(group);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Backoff parameters for the wait-for-index-ready loop. The wait sleeps
/// in `poll_tick` steps so cancellation is observed promptly, doubles the
/// readiness re-check interval up to `max_backoff`, and gives up after
/// `deadline` with a diagnosable timeout warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_tick: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub deadline: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_tick: Duration::from_millis(50),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            deadline: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Applied,
    Skipped,
    Abandoned,
}

enum WaitOutcome {
    Ready,
    Cancelled,
    TimedOut,
}

/// Per-view refresh orchestration: one single-worker task, one coalesced
/// pending-request slot, and an interrupt flag checked by every wait.
///
/// The interactive side only swaps the slot (cheap) and applies resolved
/// groups; resolution itself runs on the blocking pool. A new request
/// always replaces an unconsumed one, and an in-flight resolution whose
/// request has been superseded abandons without publishing.
pub struct ViewRefresher {
    shared: Arc<Shared>,
}

struct Shared {
    engine: Arc<GroupResolutionEngine>,
    view: Arc<dyn TabView>,
    pending: Mutex<Option<RefreshRequest>>,
    notify: Notify,
    interrupt: AtomicBool,
    disposed: AtomicBool,
    policy: WaitPolicy,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ViewRefresher {
    /// Spawn the worker task for a view. Must be called from within a
    /// Tokio runtime.
    pub fn spawn(engine: Arc<GroupResolutionEngine>, view: Arc<dyn TabView>) -> Self {
        Self::spawn_with_policy(engine, view, WaitPolicy::default())
    }

    pub fn spawn_with_policy(
        engine: Arc<GroupResolutionEngine>,
        view: Arc<dyn TabView>,
        policy: WaitPolicy,
    ) -> Self {
        let shared = Arc::new(Shared {
            engine,
            view,
            pending: Mutex::new(None),
            notify: Notify::new(),
            interrupt: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            policy,
        });
        let worker = shared.clone();
        tokio::spawn(async move {
            worker.run().await;
        });
        Self { shared }
    }

    /// Enqueue a refresh. Coalesced: replaces any unconsumed request and
    /// interrupts an in-flight wait so the stale cycle abandons.
    pub fn request_refresh(&self, request: RefreshRequest) {
        *lock(&self.shared.pending) = Some(request);
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.shared.notify.notify_one();
    }

    /// Nudge the worker after this view becomes the selected one, so a
    /// deferred request gets its turn.
    pub fn on_selected(&self) {
        self.shared.notify.notify_one();
    }

    /// Stop the worker. No further requests are processed and any
    /// in-flight wait observes the flag at its next poll.
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.shared.notify.notify_one();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }
}

impl Shared {
    async fn run(&self) {
        loop {
            if self.disposed.load(Ordering::SeqCst) {
                return;
            }
            let taken = lock(&self.pending).take();
            let Some(request) = taken else {
                self.notify.notified().await;
                continue;
            };

            if !self.view.is_selected() {
                // Defer without dropping the request; a newer one may
                // still replace it while the view stays unselected.
                {
                    let mut slot = lock(&self.pending);
                    if slot.is_none() {
                        *slot = Some(request);
                    }
                }
                self.notify.notified().await;
                continue;
            }

            self.interrupt.store(false, Ordering::SeqCst);
            let outcome = self.run_cycle(request).await;
            debug!("refresh cycle finished: {outcome:?}");
        }
    }

    async fn run_cycle(&self, request: RefreshRequest) -> CycleOutcome {
        loop {
            if self.cancelled() {
                return CycleOutcome::Abandoned;
            }

            let engine = self.engine.clone();
            let displayed = self.view.displayed();
            let req = request.clone();
            let joined = tokio::task::spawn_blocking(move || {
                engine.resolve(
                    &req.file,
                    displayed.as_ref().map(|r| &r.group),
                    req.requested.as_ref(),
                    req.force,
                    req.stub,
                )
            })
            .await;

            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!("resolution task failed: {err}");
                    return CycleOutcome::Abandoned;
                }
            };

            match result {
                Ok(resolution) => {
                    if self.cancelled() || self.superseded() {
                        return CycleOutcome::Abandoned;
                    }
                    let current = self.view.displayed();
                    let unchanged = current
                        .as_ref()
                        .is_some_and(|c| c.visually_equal(&resolution));
                    if unchanged && !request.force {
                        return CycleOutcome::Skipped;
                    }
                    self.view.apply(resolution);
                    return CycleOutcome::Applied;
                }
                Err(ResolveError::IndexNotReady) => match self.wait_for_index_ready().await {
                    WaitOutcome::Ready => continue,
                    WaitOutcome::Cancelled => return CycleOutcome::Abandoned,
                    WaitOutcome::TimedOut => {
                        warn!(
                            "gave up waiting for the index after {:?} while refreshing {:?}",
                            self.policy.deadline, request.file
                        );
                        return CycleOutcome::Abandoned;
                    }
                },
                Err(err) => {
                    warn!("resolution failed for {:?}: {err}", request.file);
                    return CycleOutcome::Abandoned;
                }
            }
        }
    }

    /// Park-and-poll until the index leaves its not-ready state, with
    /// exponential backoff between readiness checks and a hard deadline.
    /// Cancellation (a superseding request or disposal) is observed every
    /// poll tick.
    async fn wait_for_index_ready(&self) -> WaitOutcome {
        let started = Instant::now();
        let mut backoff = self.policy.initial_backoff;
        loop {
            if self.cancelled() {
                return WaitOutcome::Cancelled;
            }
            if self.engine.index_ready() {
                return WaitOutcome::Ready;
            }
            if started.elapsed() >= self.policy.deadline {
                return WaitOutcome::TimedOut;
            }

            let mut slept = Duration::ZERO;
            while slept < backoff {
                if self.cancelled() {
                    return WaitOutcome::Cancelled;
                }
                let tick = self.policy.poll_tick.min(backoff - slept);
                sleep(tick).await;
                slept += tick;
            }
            backoff = (backoff * 2).min(self.policy.max_backoff);
        }
    }

    fn cancelled(&self) -> bool {
        self.disposed.load(Ordering::SeqCst) || self.interrupt.load(Ordering::SeqCst)
    }

    fn superseded(&self) -> bool {
        lock(&self.pending).is_some()
    }
}
