//! Periodic re-fetch of a session's message list.
//!
//! One task per mounted session view. Every tick fetches the full list and
//! publishes it as a new [`Snapshot`] that replaces the previous one. At most
//! one request is in flight: the fetch is awaited inside the loop and missed
//! ticks are skipped.

use async_trait::async_trait;
use rand::Rng;
use shared::{MessageList, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

use crate::config::PollingConfig;
use crate::error::ClientError;

/// Upper bound of the random extra delay, as a fraction of the backoff
const MAX_JITTER: f64 = 0.3;

#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_messages(&self, session_id: Uuid) -> Result<MessageList, ClientError>;
}

/// Capped exponential backoff applied after consecutive poll failures
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Delay before jitter for the `failures`-th failure in a row
    pub fn base_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (failures - 1).min(20);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }

    pub fn delay<R: Rng + ?Sized>(&self, failures: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(failures);
        base + base.mul_f64(rng.gen_range(0.0..=MAX_JITTER))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub backoff: Backoff,
    pub banner_threshold: u32,
}

impl PollOptions {
    fn with_interval(config: &PollingConfig, interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(1)),
            backoff: Backoff {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
            },
            banner_threshold: config.failure_banner_threshold.max(1),
        }
    }

    pub fn presenter(config: &PollingConfig) -> Self {
        Self::with_interval(config, config.presenter_interval_ms)
    }

    pub fn participant(config: &PollingConfig) -> Self {
        Self::with_interval(config, config.participant_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    SessionEnded,
    /// The server refused the poll for good, e.g. the session does not exist
    Rejected(String),
    Cancelled,
}

/// Latest synchronized state of one session
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Result of the last successful fetch
    pub list: Option<MessageList>,
    pub consecutive_failures: u32,
    /// Set once failures reach the threshold; cleared by the next success
    pub banner: bool,
    pub last_error: Option<String>,
    pub stopped: Option<StopReason>,
}

pub struct PollHandle {
    cancel: watch::Sender<bool>,
    snapshots: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Stop future ticks. A request already in flight is allowed to finish.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the loop to exit and return its final snapshot
    pub async fn stopped(self) -> Snapshot {
        if let Err(e) = self.task.await {
            tracing::error!("Poll task failed: {}", e);
        }
        self.snapshots.borrow().clone()
    }
}

pub fn spawn(source: Arc<dyn MessageSource>, session_id: Uuid, options: PollOptions) -> PollHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
    let task = tokio::spawn(run(source, session_id, options, cancel_rx, snapshot_tx));

    PollHandle {
        cancel: cancel_tx,
        snapshots: snapshot_rx,
        task,
    }
}

/// Resolves once cancellation is requested or the handle is dropped
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

async fn run(
    source: Arc<dyn MessageSource>,
    session_id: Uuid,
    options: PollOptions,
    mut cancel: watch::Receiver<bool>,
    snapshots: watch::Sender<Snapshot>,
) {
    let mut ticker = time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut snapshot = Snapshot::default();
    tracing::debug!("Polling session {} every {:?}", session_id, options.interval);

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            _ = ticker.tick() => {}
        }

        match source.fetch_messages(session_id).await {
            Ok(list) => {
                if snapshot.banner {
                    tracing::info!("Polling session {} recovered", session_id);
                }
                let ended = list.session.status == SessionStatus::Ended;
                snapshot = Snapshot {
                    list: Some(list),
                    stopped: ended.then_some(StopReason::SessionEnded),
                    ..Snapshot::default()
                };
                snapshots.send_replace(snapshot.clone());
                if ended {
                    tracing::info!("Session {} ended, polling stopped", session_id);
                    return;
                }
            }
            Err(e) if !e.is_transient() => {
                tracing::warn!("Polling session {} rejected: {}", session_id, e);
                snapshot.last_error = Some(e.to_string());
                snapshot.stopped = Some(StopReason::Rejected(e.to_string()));
                snapshots.send_replace(snapshot);
                return;
            }
            Err(e) => {
                snapshot.consecutive_failures += 1;
                let failures = snapshot.consecutive_failures;
                tracing::warn!(
                    "Polling session {} failed ({} in a row): {}",
                    session_id,
                    failures,
                    e
                );
                if failures == options.banner_threshold {
                    tracing::error!(
                        "Session {} unreachable after {} attempts",
                        session_id,
                        failures
                    );
                }
                snapshot.banner = failures >= options.banner_threshold;
                snapshot.last_error = Some(e.to_string());
                snapshots.send_replace(snapshot.clone());

                let delay = options.backoff.delay(failures, &mut rand::thread_rng());
                tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => break,
                    _ = time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::debug!("Polling session {} cancelled", session_id);
    snapshot.stopped = Some(StopReason::Cancelled);
    snapshots.send_replace(snapshot);
}


#[cfg(test)]
mod tests {
    use super::test_support::session_list;
    use super::*;
    use rand::rngs::mock::StepRng;
    use shared::ErrorKind;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    type Reply = Result<MessageList, ClientError>;

    /// Replays canned replies; once exhausted keeps answering with an active session
    struct ScriptedSource {
        replies: Mutex<VecDeque<Reply>>,
        latency: Duration,
        calls: Mutex<Vec<Instant>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        completed: AtomicUsize,
        started: Notify,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Reply>) -> Self {
            Self::with_latency(replies, Duration::ZERO)
        }

        fn with_latency(replies: Vec<Reply>, latency: Duration) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                latency,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                started: Notify::new(),
            }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn fetch_messages(&self, session_id: Uuid) -> Result<MessageList, ClientError> {
            self.calls.lock().unwrap().push(Instant::now());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.started.notify_one();

            if !self.latency.is_zero() {
                time::sleep(self.latency).await;
            }

            let reply = self.replies.lock().unwrap().pop_front();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);
            reply.unwrap_or_else(|| Ok(session_list(session_id, SessionStatus::Active)))
        }
    }

    fn options(interval_ms: u64) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(interval_ms),
            backoff: Backoff {
                base: Duration::from_secs(1),
                max: Duration::from_secs(30),
            },
            banner_threshold: 3,
        }
    }

    fn transient() -> Reply {
        Err(ClientError::Transient("connection refused".to_string()))
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let backoff = Backoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        assert_eq!(backoff.base_delay(0), Duration::ZERO);
        assert_eq!(backoff.base_delay(1), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(2), Duration::from_secs(2));
        assert_eq!(backoff.base_delay(5), Duration::from_secs(16));
        assert_eq!(backoff.base_delay(6), Duration::from_secs(30));
        assert_eq!(backoff.base_delay(400), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_thirty_percent() {
        let backoff = Backoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        let mut low = StepRng::new(0, 0);
        assert_eq!(backoff.delay(3, &mut low), Duration::from_secs(4));

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let delay = backoff.delay(3, &mut rng);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_millis(5200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_raised_after_three_failures_and_cleared_on_success() {
        let session_id = Uuid::new_v4();
        let source = Arc::new(ScriptedSource::new(vec![
            transient(),
            transient(),
            transient(),
            Ok(session_list(session_id, SessionStatus::Active)),
            Ok(session_list(session_id, SessionStatus::Ended)),
        ]));
        let handle = spawn(source.clone(), session_id, options(100));
        let mut snapshots = handle.subscribe();

        let raised = snapshots.wait_for(|s| s.banner).await.unwrap().clone();
        assert_eq!(raised.consecutive_failures, 3);
        assert!(raised.list.is_none());
        assert_eq!(raised.last_error.as_deref(), Some("server unreachable: connection refused"));

        let last = handle.stopped().await;
        assert!(!last.banner);
        assert_eq!(last.consecutive_failures, 0);
        assert_eq!(last.stopped, Some(StopReason::SessionEnded));
        assert_eq!(source.call_times().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_exponentially() {
        let session_id = Uuid::new_v4();
        let source = Arc::new(ScriptedSource::new(vec![
            transient(),
            transient(),
            transient(),
            Ok(session_list(session_id, SessionStatus::Ended)),
        ]));
        let handle = spawn(source.clone(), session_id, options(100));
        handle.stopped().await;

        let calls = source.call_times();
        assert_eq!(calls.len(), 4);
        for (i, pair) in calls.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let floor = Duration::from_secs(1 << i);
            assert!(gap >= floor, "gap {:?} shorter than {:?}", gap, floor);
            assert!(gap <= floor.mul_f64(1.3) + Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_requests_never_overlap() {
        let session_id = Uuid::new_v4();
        let source = Arc::new(ScriptedSource::with_latency(
            vec![
                Ok(session_list(session_id, SessionStatus::Active)),
                Ok(session_list(session_id, SessionStatus::Active)),
                Ok(session_list(session_id, SessionStatus::Active)),
                Ok(session_list(session_id, SessionStatus::Ended)),
            ],
            Duration::from_secs(5),
        ));
        let handle = spawn(source.clone(), session_id, options(1000));
        handle.stopped().await;

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        let calls = source.call_times();
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_stops_the_loop() {
        let session_id = Uuid::new_v4();
        let source = Arc::new(ScriptedSource::new(vec![Err(ClientError::Api {
            kind: ErrorKind::NotFound,
            message: "session not found".to_string(),
        })]));
        let handle = spawn(source.clone(), session_id, options(100));

        let last = handle.stopped().await;
        assert!(matches!(last.stopped, Some(StopReason::Rejected(_))));
        assert_eq!(source.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_in_flight_request_finish() {
        let session_id = Uuid::new_v4();
        let source = Arc::new(ScriptedSource::with_latency(vec![], Duration::from_secs(5)));
        let handle = spawn(source.clone(), session_id, options(100));

        source.started.notified().await;
        handle.cancel();

        let last = handle.stopped().await;
        assert_eq!(last.stopped, Some(StopReason::Cancelled));
        assert_eq!(source.call_times().len(), 1);
        assert_eq!(source.completed.load(Ordering::SeqCst), 1);
        // The completed fetch was still published
        assert!(last.list.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_snapshot_replaces_the_previous_list() {
        let session_id = Uuid::new_v4();
        let mut first = session_list(session_id, SessionStatus::Active);
        first.session.messages_count = 1;
        let mut second = session_list(session_id, SessionStatus::Ended);
        second.session.messages_count = 2;

        let source = Arc::new(ScriptedSource::new(vec![Ok(first), Ok(second)]));
        let handle = spawn(source, session_id, options(100));
        let mut snapshots = handle.subscribe();

        snapshots.wait_for(|s| s.list.is_some()).await.unwrap();
        let last = handle.stopped().await;
        let list = last.list.unwrap();
        assert_eq!(list.session.messages_count, 2);
        assert_eq!(list.session.status, SessionStatus::Ended);
    }
}
