// ── Request executor ──
//
// A single background worker drains one queue and performs at most one
// blocking RPC exchange at a time (single-flight). Results go straight
// into the ResourceCache; lifecycle outcomes travel back to the
// poll-driving thread as `EngineEvent`s, so ConnectionState is only
// ever mutated on that thread.
//
// The queue is one structure with two lanes: control items (connect,
// commands, forced refreshes) pop ahead of scheduled polls, but never
// concurrently with them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gridmon_rpc::channel::{ConnectTarget, RpcChannel, RpcConnector};
use gridmon_rpc::error::RpcError;
use gridmon_rpc::model::VersionInfo;
use gridmon_rpc::request::{RpcReply, RpcRequest};

use crate::cache::ResourceCache;
use crate::command::Command;
use crate::error::CoreError;
use crate::kind::ResourceKind;

const CONNECT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Completion channel for callers that wait on a specific item.
pub(crate) type DoneSender = SyncSender<Result<(), CoreError>>;

/// One unit of work for the executor.
pub(crate) enum WorkItem {
    /// Dial the daemon, exchange versions, authenticate.
    Establish {
        target: ConnectTarget,
        password: SecretString,
        used_default: bool,
        /// For local daemons: keep retrying the dial until this
        /// deadline, to tolerate a daemon still starting up.
        grace_deadline: Option<Instant>,
        generation: u64,
        language: Option<String>,
        client_version: VersionInfo,
    },
    /// Drop the channel without reconnecting.
    Close,
    /// Scheduled or forced fetch of one resource kind.
    Poll {
        kind: ResourceKind,
        generation: u64,
        requested_at: Instant,
        done: Option<DoneSender>,
    },
    /// User-issued write operation.
    Command {
        command: Command,
        generation: u64,
        done: Option<DoneSender>,
    },
}

/// Lifecycle outcome posted from the worker to the poll thread.
pub(crate) enum EngineEvent {
    Established {
        version: VersionInfo,
        generation: u64,
    },
    EstablishFailed {
        error: CoreError,
        generation: u64,
    },
    /// A request failed in a way that means the channel is unusable.
    ChannelBroken { generation: u64 },
    /// The daemon's status says the manager should exit.
    DaemonRequestedShutdown,
    /// A request exceeded the slow threshold; the scheduler should
    /// cool down rather than pile on.
    SlowRequest { duration: Duration },
}

// ── Queue ────────────────────────────────────────────────────────────

struct QueueState {
    control: VecDeque<WorkItem>,
    polls: VecDeque<WorkItem>,
    closed: bool,
}

/// Single request queue with blocking pop. Control items (handshake,
/// commands, forced refreshes) take priority over scheduled polls.
pub(crate) struct RequestQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl RequestQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                control: VecDeque::new(),
                polls: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn push_control(&self, item: WorkItem) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return;
        }
        state.control.push_back(item);
        self.ready.notify_one();
    }

    pub(crate) fn push_poll(&self, item: WorkItem) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return;
        }
        state.polls.push_back(item);
        self.ready.notify_one();
    }

    /// Block until an item is available or the queue is closed. After
    /// close, queued-but-unstarted items are never handed out; their
    /// completion channels are dropped, which callers observe as a
    /// disconnect.
    pub(crate) fn pop(&self) -> Option<WorkItem> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.closed {
                return None;
            }
            if let Some(item) = state.control.pop_front() {
                return Some(item);
            }
            if let Some(item) = state.polls.pop_front() {
                return Some(item);
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.control.clear();
        state.polls.clear();
        self.ready.notify_all();
    }
}

// ── Activity meter ───────────────────────────────────────────────────

/// Tracks whether the worker is inside a blocking exchange and since
/// when, for the facade's stall detection.
pub(crate) struct ActivityMeter {
    started_at: Mutex<Option<Instant>>,
    completed: AtomicU64,
}

impl ActivityMeter {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Mutex::new(None),
            completed: AtomicU64::new(0),
        }
    }

    fn begin(&self) {
        *self
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn end(&self) {
        *self
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// An exchange has been running for longer than `window`.
    pub(crate) fn is_stalled(&self, window: Duration, now: Instant) -> bool {
        self.started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|t| now.saturating_duration_since(t) > window)
    }

    pub(crate) fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

// ── Worker ───────────────────────────────────────────────────────────

pub(crate) struct Worker {
    connector: Box<dyn RpcConnector>,
    channel: Option<Box<dyn RpcChannel>>,
    cache: Arc<ResourceCache>,
    queue: Arc<RequestQueue>,
    events: mpsc::UnboundedSender<EngineEvent>,
    refresh: watch::Sender<u64>,
    cancel: CancellationToken,
    meter: Arc<ActivityMeter>,
    slow_threshold: Duration,
    /// Bumped by each Establish; results tagged with an older
    /// generation are discarded instead of applied.
    generation: u64,
    target_is_local: bool,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_worker(
    connector: Box<dyn RpcConnector>,
    cache: Arc<ResourceCache>,
    queue: Arc<RequestQueue>,
    events: mpsc::UnboundedSender<EngineEvent>,
    refresh: watch::Sender<u64>,
    cancel: CancellationToken,
    meter: Arc<ActivityMeter>,
    slow_threshold: Duration,
) -> (JoinHandle<()>, std::sync::mpsc::Receiver<()>) {
    let (exit_tx, exit_rx) = std::sync::mpsc::sync_channel(1);
    let handle = std::thread::Builder::new()
        .name("gridmon-executor".into())
        .spawn(move || {
            let mut worker = Worker {
                connector,
                channel: None,
                cache,
                queue,
                events,
                refresh,
                cancel,
                meter,
                slow_threshold,
                generation: 0,
                target_is_local: false,
            };
            worker.run();
            let _ = exit_tx.send(());
        })
        .unwrap_or_else(|e| panic!("failed to spawn executor thread: {e}"));
    (handle, exit_rx)
}

impl Worker {
    fn run(&mut self) {
        debug!("executor worker started");
        while !self.cancel.is_cancelled() {
            let Some(item) = self.queue.pop() else { break };
            match item {
                WorkItem::Establish {
                    target,
                    password,
                    used_default,
                    grace_deadline,
                    generation,
                    language,
                    client_version,
                } => self.handle_establish(
                    &target,
                    &password,
                    used_default,
                    grace_deadline,
                    generation,
                    language.as_deref(),
                    client_version,
                ),
                WorkItem::Close => {
                    self.channel = None;
                    debug!("channel closed");
                }
                WorkItem::Poll {
                    kind,
                    generation,
                    requested_at,
                    done,
                } => self.handle_poll(kind, generation, requested_at, done),
                WorkItem::Command {
                    command,
                    generation,
                    done,
                } => self.handle_command(&command, generation, done),
            }
        }
        debug!("executor worker exiting");
    }

    // ── Establish ────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn handle_establish(
        &mut self,
        target: &ConnectTarget,
        password: &SecretString,
        used_default: bool,
        grace_deadline: Option<Instant>,
        generation: u64,
        language: Option<&str>,
        client_version: VersionInfo,
    ) {
        self.channel = None;
        self.generation = generation;
        self.target_is_local = target.is_local();

        match self.establish(target, password, used_default, grace_deadline, client_version) {
            Ok((mut channel, version)) => {
                if let Some(language) = language {
                    // Cosmetic; a failure here must not fail the connect.
                    if let Err(e) = channel.execute(&RpcRequest::SetLanguage {
                        language: language.to_owned(),
                    }) {
                        warn!(error = %e, "set_language failed");
                    }
                }
                self.channel = Some(channel);
                info!(%target, %version, "connected to daemon");
                let _ = self.events.send(EngineEvent::Established {
                    version,
                    generation,
                });
            }
            Err(error) => {
                warn!(%target, error = %error, "connect failed");
                let _ = self
                    .events
                    .send(EngineEvent::EstablishFailed { error, generation });
            }
        }
    }

    fn establish(
        &mut self,
        target: &ConnectTarget,
        password: &SecretString,
        used_default: bool,
        grace_deadline: Option<Instant>,
        client_version: VersionInfo,
    ) -> Result<(Box<dyn RpcChannel>, VersionInfo), CoreError> {
        let mut channel = self.dial(target, grace_deadline)?;

        let version = match channel.execute(&RpcRequest::ExchangeVersions {
            client: client_version,
        }) {
            Ok(RpcReply::Version(version)) => version,
            Ok(_) => {
                return Err(CoreError::TransportUnavailable {
                    reason: "unexpected reply to version exchange".into(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if !version.compatible_with(&client_version) {
            return Err(CoreError::VersionMismatch {
                daemon: version,
                client: client_version,
            });
        }

        match channel.execute(&RpcRequest::Authorize {
            password: password.clone(),
        }) {
            Ok(RpcReply::Authorized) => Ok((channel, version)),
            Ok(_) => Err(CoreError::TransportUnavailable {
                reason: "unexpected reply to authorize".into(),
            }),
            Err(RpcError::AuthenticationFailed) => Err(CoreError::AuthFailed {
                used_default_credential: used_default,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Dial the daemon, retrying until the grace deadline for a local
    /// daemon that may still be starting.
    fn dial(
        &mut self,
        target: &ConnectTarget,
        grace_deadline: Option<Instant>,
    ) -> Result<Box<dyn RpcChannel>, CoreError> {
        loop {
            match self.connector.open(target) {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    let within_grace = grace_deadline.is_some_and(|d| Instant::now() < d);
                    if !within_grace || self.cancel.is_cancelled() {
                        return Err(CoreError::TransportUnavailable {
                            reason: e.to_string(),
                        });
                    }
                    debug!(%target, error = %e, "daemon not up yet, retrying");
                    std::thread::sleep(CONNECT_RETRY_PAUSE);
                }
            }
        }
    }

    // ── Poll ─────────────────────────────────────────────────────────

    fn handle_poll(
        &mut self,
        kind: ResourceKind,
        generation: u64,
        requested_at: Instant,
        done: Option<DoneSender>,
    ) {
        if generation != self.generation {
            // The in-flight flag may already belong to a newer poll for
            // the same kind; the invalidation that follows an establish
            // resets it, so it is left untouched here.
            debug!(%kind, "discarding poll from stale generation");
            reply(done, Err(CoreError::Disconnected));
            return;
        }
        let Some(mut channel) = self.channel.take() else {
            self.cache.clear_in_flight(kind);
            reply(done, Err(CoreError::Disconnected));
            return;
        };

        let request = self.build_fetch(kind);
        self.meter.begin();
        let start = Instant::now();
        let result = channel.execute(&request);
        let elapsed = start.elapsed();
        self.meter.end();

        match result {
            Ok(r) => {
                self.channel = Some(channel);
                if self.cache.apply_reply(kind, r, requested_at, elapsed) {
                    self.refresh.send_modify(|n| *n += 1);
                    self.check_shutdown_request(kind);
                }
                self.note_slow(elapsed);
                reply(done, Ok(()));
            }
            Err(e) => {
                self.cache
                    .record_failure(kind, e.result_code(), requested_at, elapsed);
                let broken = e.is_channel_broken();
                warn!(%kind, error = %e, "poll failed");
                reply(done, Err(e.into()));
                if broken {
                    let _ = self.events.send(EngineEvent::ChannelBroken {
                        generation: self.generation,
                    });
                } else {
                    self.channel = Some(channel);
                }
            }
        }
    }

    fn build_fetch(&self, kind: ResourceKind) -> RpcRequest {
        match kind {
            ResourceKind::Status => RpcRequest::GetStatus,
            ResourceKind::Projects => RpcRequest::GetProjects,
            ResourceKind::Tasks => RpcRequest::GetTasks { active_only: false },
            ResourceKind::Transfers => RpcRequest::GetTransfers,
            ResourceKind::Messages => RpcRequest::GetMessages {
                seqno: self.cache.messages().snapshot.last_seqno(),
            },
            ResourceKind::Notices => RpcRequest::GetNotices {
                seqno: self.cache.notices().snapshot.last_seqno(),
            },
            ResourceKind::Statistics => RpcRequest::GetStatistics,
            ResourceKind::DiskUsage => RpcRequest::GetDiskUsage,
            ResourceKind::AcctMgrInfo => RpcRequest::GetAcctMgrInfo,
            ResourceKind::State => RpcRequest::GetState,
        }
    }

    /// A local daemon that wants its manager gone is honored; a remote
    /// one cannot shut this process down.
    fn check_shutdown_request(&self, kind: ResourceKind) {
        if kind != ResourceKind::Status {
            return;
        }
        if self.cache.status().snapshot.manager_must_quit {
            if self.target_is_local {
                let _ = self.events.send(EngineEvent::DaemonRequestedShutdown);
            } else {
                debug!("remote daemon requested manager shutdown; ignored");
            }
        }
    }

    // ── Command ──────────────────────────────────────────────────────

    fn handle_command(&mut self, command: &Command, generation: u64, done: Option<DoneSender>) {
        if generation != self.generation {
            reply(done, Err(CoreError::Disconnected));
            return;
        }
        let Some(mut channel) = self.channel.take() else {
            reply(done, Err(CoreError::Disconnected));
            return;
        };

        let request = command.to_request();
        debug!(request = request.name(), "executing command");
        self.meter.begin();
        let start = Instant::now();
        let result = channel.execute(&request);
        let elapsed = start.elapsed();
        self.meter.end();

        match result {
            Ok(_) => {
                self.channel = Some(channel);
                for kind in command.invalidates() {
                    self.cache.invalidate(*kind);
                }
                self.refresh.send_modify(|n| *n += 1);
                self.note_slow(elapsed);
                reply(done, Ok(()));
            }
            Err(e) => {
                let broken = e.is_channel_broken();
                warn!(request = request.name(), error = %e, "command failed");
                reply(done, Err(e.into()));
                if broken {
                    let _ = self.events.send(EngineEvent::ChannelBroken {
                        generation: self.generation,
                    });
                } else {
                    self.channel = Some(channel);
                }
            }
        }
    }

    fn note_slow(&self, elapsed: Duration) {
        if elapsed >= self.slow_threshold {
            let _ = self
                .events
                .send(EngineEvent::SlowRequest { duration: elapsed });
        }
    }
}

fn reply(done: Option<DoneSender>, result: Result<(), CoreError>) {
    if let Some(tx) = done {
        let _ = tx.try_send(result);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn poll_item(kind: ResourceKind) -> WorkItem {
        WorkItem::Poll {
            kind,
            generation: 0,
            requested_at: Instant::now(),
            done: None,
        }
    }

    fn kind_of(item: &WorkItem) -> Option<ResourceKind> {
        match item {
            WorkItem::Poll { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn control_items_pop_before_polls() {
        let queue = RequestQueue::new();
        queue.push_poll(poll_item(ResourceKind::Tasks));
        queue.push_control(WorkItem::Command {
            command: Command::RunBenchmarks,
            generation: 0,
            done: None,
        });

        let first = queue.pop().unwrap();
        assert!(matches!(first, WorkItem::Command { .. }));
        let second = queue.pop().unwrap();
        assert_eq!(kind_of(&second), Some(ResourceKind::Tasks));
    }

    #[test]
    fn polls_keep_fifo_order() {
        let queue = RequestQueue::new();
        queue.push_poll(poll_item(ResourceKind::Status));
        queue.push_poll(poll_item(ResourceKind::Messages));

        assert_eq!(kind_of(&queue.pop().unwrap()), Some(ResourceKind::Status));
        assert_eq!(kind_of(&queue.pop().unwrap()), Some(ResourceKind::Messages));
    }

    #[test]
    fn close_drops_pending_items_and_unblocks_pop() {
        let queue = Arc::new(RequestQueue::new());
        queue.push_poll(poll_item(ResourceKind::Status));
        queue.close();
        assert!(queue.pop().is_none());

        // A blocked popper is released by close.
        let q = Arc::clone(&queue);
        let handle = std::thread::spawn(move || q.pop().is_none());
        assert!(handle.join().unwrap());
    }

    #[test]
    fn pushes_after_close_are_ignored() {
        let queue = RequestQueue::new();
        queue.close();
        queue.push_control(WorkItem::Close);
        assert!(queue.pop().is_none());
    }

    struct RefusingConnector;

    impl RpcConnector for RefusingConnector {
        fn open(&self, _target: &ConnectTarget) -> Result<Box<dyn RpcChannel>, RpcError> {
            Err(RpcError::Transport {
                reason: "unused".into(),
            })
        }
    }

    #[test]
    fn stale_poll_is_discarded_without_touching_the_in_flight_flag() {
        let cache = Arc::new(ResourceCache::new(100));
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (refresh_tx, _refresh_rx) = watch::channel(0u64);
        let mut worker = Worker {
            connector: Box::new(RefusingConnector),
            channel: None,
            cache: Arc::clone(&cache),
            queue: Arc::new(RequestQueue::new()),
            events: events_tx,
            refresh: refresh_tx,
            cancel: CancellationToken::new(),
            meter: Arc::new(ActivityMeter::new()),
            slow_threshold: Duration::from_secs(5),
            generation: 2,
            target_is_local: false,
        };

        // The flag is held by a newer-generation poll already queued
        // for the same kind.
        assert!(!cache.mark_in_flight(ResourceKind::Tasks));

        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        worker.handle_poll(ResourceKind::Tasks, 1, Instant::now(), Some(tx));

        assert!(matches!(rx.try_recv(), Ok(Err(CoreError::Disconnected))));
        assert!(
            cache.meta(ResourceKind::Tasks).in_flight,
            "newer poll's reservation must survive the discard"
        );
    }

    #[test]
    fn meter_reports_a_long_running_exchange_as_stalled() {
        let meter = ActivityMeter::new();
        let now = Instant::now();
        assert!(!meter.is_stalled(Duration::from_secs(1), now));

        meter.begin();
        assert!(meter.is_stalled(Duration::from_secs(30), now + Duration::from_secs(31)));
        meter.end();
        assert!(!meter.is_stalled(Duration::ZERO, now + Duration::from_secs(31)));
        assert_eq!(meter.completed_count(), 1);
    }
}
