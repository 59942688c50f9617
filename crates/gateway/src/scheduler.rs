//! Request Scheduler (§4.5): one FIFO queue per `sessionKey`, a global
//! concurrency bound, cooperative cancellation, and bounded retries of
//! transient failures.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::future::BoxFuture;
use rand::Rng;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use wingman_metrics::{counter, gauge, requests as metric};
use wingman_protocol::AgentEventPayload;

/// A single agent invocation, already routed to `(agentId, sessionKey)`.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub request_id: String,
    pub agent_id: String,
    pub session_key: String,
    pub session_id: String,
    pub content: Option<String>,
    pub queue_if_busy: bool,
}

/// Outcome of one [`AgentRunner::run`] attempt.
#[derive(Debug, Clone)]
pub struct RunnerError {
    pub transient: bool,
    pub code: String,
    pub message: String,
}

impl RunnerError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            code: "Transient".into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn hard(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transient: false,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Invokes an agent for one request, streaming lifecycle events as they
/// occur and observing `cancel` cooperatively. Implementations own whatever
/// provider/tool-execution machinery backs the agent; the scheduler only
/// needs this seam.
pub trait AgentRunner: Send + Sync {
    fn run(
        &self,
        request: AgentRequest,
        events: mpsc::UnboundedSender<AgentEventPayload>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<(), RunnerError>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(4),
            jitter: Duration::from_millis(200),
            attempts: 3,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.base.saturating_mul(1 << attempt.min(16));
        let capped = scaled.min(self.max);
        let jitter_ms = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        capped + Duration::from_millis(jitter_ms)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_concurrent_requests: usize,
    pub graceful_shutdown: Duration,
    pub coordinator_idle: Duration,
    pub retry: RetryPolicy,
}

enum Command {
    Submit {
        request: AgentRequest,
        events: mpsc::UnboundedSender<AgentEventPayload>,
    },
    Cancel {
        request_id: String,
    },
    Finished {
        request_id: String,
    },
    CancellationTimedOut {
        request_id: String,
    },
}

struct Queued {
    request: AgentRequest,
    events: mpsc::UnboundedSender<AgentEventPayload>,
}

/// Schedules and runs agent requests, one coordinator task per live
/// `sessionKey`.
pub struct Scheduler {
    coordinators: DashMap<String, mpsc::UnboundedSender<Command>>,
    /// `requestId -> sessionKey`, so `req:agent:cancel` (which only carries
    /// a `requestId`) can find the right coordinator.
    request_sessions: DashMap<String, String>,
    concurrency: Arc<Semaphore>,
    config: SchedulerConfig,
    runner: Arc<dyn AgentRunner>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig, runner: Arc<dyn AgentRunner>) -> Arc<Self> {
        Arc::new(Self {
            coordinators: DashMap::new(),
            request_sessions: DashMap::new(),
            concurrency: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            config,
            runner,
        })
    }

    /// Submit a request to its session key's coordinator, spawning the
    /// coordinator if this is the first arrival for that key.
    pub fn submit(
        self: &Arc<Self>,
        request: AgentRequest,
        events: mpsc::UnboundedSender<AgentEventPayload>,
    ) {
        self.request_sessions
            .insert(request.request_id.clone(), request.session_key.clone());
        let sender = self.coordinator_for(&request.session_key);
        let _ = sender.send(Command::Submit { request, events });
    }

    /// Count of session keys with a live coordinator task, reported as
    /// `activeSessions` on `/health` and `/stats`.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.coordinators.len()
    }

    /// `req:agent:cancel{requestId}`. A no-op if the request has already
    /// finished (idempotent on a second cancel for the same id).
    pub fn cancel(&self, request_id: &str) {
        let Some(session_key) = self.request_sessions.get(request_id).map(|e| e.clone()) else {
            return;
        };
        if let Some(sender) = self.coordinators.get(&session_key) {
            let _ = sender.send(Command::Cancel {
                request_id: request_id.to_string(),
            });
        }
    }

    fn coordinator_for(self: &Arc<Self>, session_key: &str) -> mpsc::UnboundedSender<Command> {
        if let Some(existing) = self.coordinators.get(session_key) {
            return existing.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        // Race: two callers may both miss the entry check above and both
        // spawn; `entry().or_insert` below keeps only one, the loser's
        // receiver is simply dropped and its coordinator task exits
        // immediately on a closed channel.
        let tx = self
            .coordinators
            .entry(session_key.to_string())
            .or_insert(tx)
            .clone();
        let scheduler = Arc::clone(self);
        let key = session_key.to_string();
        tokio::spawn(scheduler.run_coordinator(key, rx));
        tx
    }

    async fn run_coordinator(
        self: Arc<Self>,
        session_key: String,
        mut rx: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut queue: VecDeque<Queued> = VecDeque::new();
        let mut running: Option<(String, CancellationToken)> = None;
        let self_tx = {
            let Some(entry) = self.coordinators.get(&session_key) else {
                return;
            };
            entry.clone()
        };

        loop {
            let next = tokio::time::timeout(self.config.coordinator_idle, rx.recv()).await;
            let command = match next {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(_) if running.is_none() && queue.is_empty() => break,
                Err(_) => continue,
            };

            match command {
                Command::Submit { request, events } => {
                    if running.is_some() {
                        if !request.queue_if_busy {
                            let _ = events.send(AgentEventPayload::AgentError {
                                code: "Busy".into(),
                                message: "session is busy".into(),
                            });
                            continue;
                        }
                        let position = queue.len() + 1;
                        let _ = events.send(AgentEventPayload::RequestQueued { position });
                        queue.push_back(Queued { request, events });
                        gauge!(metric::QUEUE_DEPTH).set(queue.len() as f64);
                    } else {
                        self.start(&mut running, request, events, self_tx.clone());
                    }
                },
                Command::Cancel { request_id } => {
                    if let Some(index) = queue.iter().position(|q| q.request.request_id == request_id) {
                        let queued = queue.remove(index).expect("index just found");
                        self.request_sessions.remove(&request_id);
                        gauge!(metric::QUEUE_DEPTH).set(queue.len() as f64);
                        counter!(metric::CANCELLED_TOTAL).increment(1);
                        let _ = queued.events.send(AgentEventPayload::AgentError {
                            code: "Cancelled".into(),
                            message: "cancelled before running".into(),
                        });
                    } else if running.as_ref().is_some_and(|(id, _)| *id == request_id) {
                        if let Some((_, token)) = &running {
                            token.cancel();
                        }
                        let tx = self_tx.clone();
                        let graceful = self.config.graceful_shutdown;
                        tokio::spawn(async move {
                            tokio::time::sleep(graceful).await;
                            let _ = tx.send(Command::CancellationTimedOut { request_id });
                        });
                    }
                },
                Command::Finished { request_id } => {
                    self.request_sessions.remove(&request_id);
                    if running.as_ref().is_some_and(|(id, _)| *id == request_id) {
                        running = None;
                        if let Some(next) = queue.pop_front() {
                            gauge!(metric::QUEUE_DEPTH).set(queue.len() as f64);
                            self.start(&mut running, next.request, next.events, self_tx.clone());
                        }
                    }
                },
                Command::CancellationTimedOut { request_id } => {
                    self.request_sessions.remove(&request_id);
                    if running.as_ref().is_some_and(|(id, _)| *id == request_id) {
                        running = None;
                        if let Some(next) = queue.pop_front() {
                            gauge!(metric::QUEUE_DEPTH).set(queue.len() as f64);
                            self.start(&mut running, next.request, next.events, self_tx.clone());
                        }
                    }
                },
            }
        }

        self.coordinators.remove(&session_key);
    }

    fn start(
        &self,
        running: &mut Option<(String, CancellationToken)>,
        request: AgentRequest,
        events: mpsc::UnboundedSender<AgentEventPayload>,
        coordinator: mpsc::UnboundedSender<Command>,
    ) {
        let cancel = CancellationToken::new();
        *running = Some((request.request_id.clone(), cancel.clone()));

        let concurrency = Arc::clone(&self.concurrency);
        let runner = Arc::clone(&self.runner);
        let retry = self.config.retry;
        let request_id = request.request_id.clone();

        let _ = events.send(AgentEventPayload::AgentStart {
            agent_id: request.agent_id.clone(),
            session_key: request.session_key.clone(),
            session_id: request.session_id.clone(),
        });
        counter!(metric::DISPATCHED_TOTAL).increment(1);

        tokio::spawn(async move {
            let Ok(_permit) = concurrency.acquire_owned().await else {
                return;
            };
            let started_at = tokio::time::Instant::now();

            let mut attempt = 0;
            loop {
                if cancel.is_cancelled() {
                    counter!(metric::CANCELLED_TOTAL).increment(1);
                    let _ = events.send(AgentEventPayload::AgentError {
                        code: "Cancelled".into(),
                        message: "cancelled".into(),
                    });
                    break;
                }

                match runner.run(request.clone(), events.clone(), cancel.clone()).await {
                    Ok(()) => {
                        counter!(metric::COMPLETED_TOTAL).increment(1);
                        break;
                    },
                    Err(err) if err.transient && attempt + 1 < retry.attempts => {
                        attempt += 1;
                        counter!(metric::RETRIED_TOTAL).increment(1);
                        tokio::time::sleep(retry.backoff(attempt)).await;
                    },
                    Err(err) => {
                        counter!(metric::FAILED_TOTAL).increment(1);
                        let _ = events.send(AgentEventPayload::AgentError {
                            code: err.code,
                            message: err.message,
                        });
                        break;
                    },
                }
            }
            wingman_metrics::histogram!(metric::DURATION_SECONDS).record(started_at.elapsed().as_secs_f64());

            let _ = coordinator.send(Command::Finished { request_id });
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Echo {
        calls: Arc<AtomicUsize>,
    }

    impl AgentRunner for Echo {
        fn run(
            &self,
            request: AgentRequest,
            events: mpsc::UnboundedSender<AgentEventPayload>,
            _cancel: CancellationToken,
        ) -> BoxFuture<'static, Result<(), RunnerError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _ = events.send(AgentEventPayload::AgentComplete {
                    message_id: format!("{}-msg", request.request_id),
                });
                Ok(())
            })
        }
    }

    fn request(id: &str, key: &str) -> AgentRequest {
        AgentRequest {
            request_id: id.into(),
            agent_id: "agent1".into(),
            session_key: key.into(),
            session_id: "sess1".into(),
            content: Some("hi".into()),
            queue_if_busy: true,
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_requests: 4,
            graceful_shutdown: Duration::from_millis(200),
            coordinator_idle: Duration::from_millis(100),
            retry: RetryPolicy::default(),
        }
    }

    #[tokio::test]
    async fn single_request_completes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(config(), Arc::new(Echo { calls: Arc::clone(&calls) }));
        let (tx, mut rx) = mpsc::unbounded_channel();
        scheduler.submit(request("r1", "k1"), tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, AgentEventPayload::AgentStart { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, AgentEventPayload::AgentComplete { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_busy_request_rejected_when_queue_if_busy_false() {
        struct Slow;
        impl AgentRunner for Slow {
            fn run(
                &self,
                _request: AgentRequest,
                _events: mpsc::UnboundedSender<AgentEventPayload>,
                cancel: CancellationToken,
            ) -> BoxFuture<'static, Result<(), RunnerError>> {
                Box::pin(async move {
                    cancel.cancelled().await;
                    Ok(())
                })
            }
        }
        let scheduler = Scheduler::new(config(), Arc::new(Slow));
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let mut busy_request = request("r1", "k1");
        busy_request.queue_if_busy = false;
        scheduler.submit(busy_request, tx1);
        assert!(matches!(rx1.recv().await.unwrap(), AgentEventPayload::AgentStart { .. }));

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let mut second = request("r2", "k1");
        second.queue_if_busy = false;
        scheduler.submit(second, tx2);
        match rx2.recv().await.unwrap() {
            AgentEventPayload::AgentError { code, .. } => assert_eq!(code, "Busy"),
            other => panic!("expected Busy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_queued_request_is_done_without_running() {
        struct Blocks;
        impl AgentRunner for Blocks {
            fn run(
                &self,
                _request: AgentRequest,
                _events: mpsc::UnboundedSender<AgentEventPayload>,
                cancel: CancellationToken,
            ) -> BoxFuture<'static, Result<(), RunnerError>> {
                Box::pin(async move {
                    cancel.cancelled().await;
                    Ok(())
                })
            }
        }
        let scheduler = Scheduler::new(config(), Arc::new(Blocks));
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        scheduler.submit(request("r1", "k1"), tx1);
        assert!(matches!(rx1.recv().await.unwrap(), AgentEventPayload::AgentStart { .. }));

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        scheduler.submit(request("r2", "k1"), tx2);
        assert!(matches!(
            rx2.recv().await.unwrap(),
            AgentEventPayload::RequestQueued { position: 1 }
        ));

        scheduler.cancel("r2");
        match rx2.recv().await.unwrap() {
            AgentEventPayload::AgentError { code, .. } => assert_eq!(code, "Cancelled"),
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }
}
