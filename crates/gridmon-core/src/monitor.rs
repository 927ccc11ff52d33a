// ── Monitor facade ──
//
// The one type a UI embeds. Owns the cache, scheduler, connection
// state machine and the executor worker; the UI drives it with
// `tick()` from its timer (roughly once per second) and reads
// snapshots between ticks. Everything here runs on the caller's
// thread; only the worker blocks on I/O.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gridmon_rpc::channel::RpcConnector;
use gridmon_rpc::model::{
    AcctMgrInfo, CcStatus, ClientState, DiskUsage, FileTransfer, Project, ProjectStatistics, Task,
    VersionInfo,
};

use crate::cache::{CacheEntry, MessageLog, NoticeLog, ResourceCache};
use crate::command::Command;
use crate::config::EngineConfig;
use crate::connection::{ConnectionState, ConnectionStateMachine};
use crate::error::CoreError;
use crate::executor::{
    ActivityMeter, EngineEvent, RequestQueue, WorkItem, spawn_worker,
};
use crate::kind::{ResourceKind, ViewMask};
use crate::scheduler::PollScheduler;

/// What one `tick` did, for the UI's benefit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// Polls enqueued this tick.
    pub scheduled: usize,
    /// The worker has been inside one blocking exchange for longer
    /// than the stall window; show "not responding" rather than stale
    /// numbers as current.
    pub stalled: bool,
    /// A local daemon asked the manager to exit. The UI should begin
    /// its own shutdown.
    pub shutdown_requested: bool,
}

/// Waits for one submitted command to complete on the worker.
pub struct CommandHandle {
    rx: Receiver<Result<(), CoreError>>,
    timeout: Duration,
}

impl CommandHandle {
    /// Block until the command finishes, up to the configured command
    /// timeout.
    pub fn wait(self) -> Result<(), CoreError> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CoreError::Stalled),
            // Queue was closed with the command still pending.
            Err(RecvTimeoutError::Disconnected) => Err(CoreError::Disconnected),
        }
    }
}

pub struct Monitor {
    cache: Arc<ResourceCache>,
    queue: Arc<RequestQueue>,
    scheduler: PollScheduler,
    connection: ConnectionStateMachine,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    refresh_rx: watch::Receiver<u64>,
    meter: Arc<ActivityMeter>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    worker_exit: Receiver<()>,
    command_timeout: Duration,
    shutdown_grace: Duration,
    stall_window: Duration,
    slow_request_cooldown: Duration,
    post_busy_cooldown: Duration,
    shutdown_requested: bool,
}

impl Monitor {
    /// Build the engine and start its worker thread. The connector is
    /// the transport seam; tests hand in a scripted one.
    pub fn new(connector: Box<dyn RpcConnector>, config: EngineConfig) -> Self {
        let cache = Arc::new(ResourceCache::new(config.message_buffer_cap));
        let queue = Arc::new(RequestQueue::new());
        let meter = Arc::new(ActivityMeter::new());
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (refresh_tx, refresh_rx) = watch::channel(0u64);

        let (worker, worker_exit) = spawn_worker(
            connector,
            Arc::clone(&cache),
            Arc::clone(&queue),
            events_tx,
            refresh_tx,
            cancel.clone(),
            Arc::clone(&meter),
            config.slow_request_threshold,
        );

        Self {
            cache,
            queue,
            scheduler: PollScheduler::new(config.intervals, config.adaptive_multiplier),
            connection: ConnectionStateMachine::new(
                config.reconnect_on_error,
                config.local_start_grace,
                config.language,
                config.client_version,
            ),
            events: events_rx,
            refresh_rx,
            meter,
            cancel,
            worker: Some(worker),
            worker_exit,
            command_timeout: config.command_timeout,
            shutdown_grace: config.shutdown_grace,
            stall_window: config.stall_window,
            slow_request_cooldown: config.slow_request_cooldown,
            post_busy_cooldown: config.post_busy_cooldown,
            shutdown_requested: false,
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to a daemon. An empty `host` means the daemon on this
    /// machine. `reset_full_state` drops all cached snapshots first
    /// (set it when switching hosts).
    pub fn connect(&mut self, host: &str, port: u16, password: SecretString, reset_full_state: bool) {
        self.connection
            .connect(host, port, password, reset_full_state, &self.cache, &self.queue);
    }

    /// Drop the channel and redo the handshake with the same target
    /// and credential.
    pub fn reconnect(&mut self) {
        self.connection.reconnect(&self.cache);
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect(&self.queue);
    }

    // ── Tick ─────────────────────────────────────────────────────────

    /// One scheduling pass. Drains worker events, advances the
    /// connection state machine, and enqueues whatever polls are due
    /// for the currently visible views. Never blocks.
    pub fn tick(&mut self, views: ViewMask, window_visible: bool) -> TickReport {
        let now = Instant::now();
        let mut report = TickReport::default();

        while let Ok(event) = self.events.try_recv() {
            if let EngineEvent::SlowRequest { duration } = event {
                debug!(?duration, "slow request; cooling down scheduler");
                self.scheduler.suspend_for(self.slow_request_cooldown, now);
                continue;
            }
            if self.connection.handle_event(event, &self.cache) {
                self.shutdown_requested = true;
            }
        }
        report.shutdown_requested = self.shutdown_requested;

        self.connection.poll(&self.queue);

        report.stalled = self.meter.is_stalled(self.stall_window, now);
        if !self.connection.is_connected() || report.stalled {
            return report;
        }

        let generation = self.connection.generation();
        for kind in self.scheduler.due_kinds(&self.cache, views, window_visible, now) {
            if self.cache.mark_in_flight(kind) {
                continue;
            }
            self.queue.push_poll(WorkItem::Poll {
                kind,
                generation,
                requested_at: now,
                done: None,
            });
            report.scheduled += 1;
        }
        report
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Queue a write operation. Commands jump ahead of scheduled polls
    /// but share the single-flight worker, so nothing overlaps the
    /// exchange in progress.
    pub fn submit_command(&mut self, command: Command) -> CommandHandle {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        // Writes only while Connected; during a reconnect cycle the
        // channel is being torn down and must not carry new commands.
        if !self.connection.is_connected() {
            let _ = tx.try_send(Err(CoreError::Disconnected));
            return CommandHandle {
                rx,
                timeout: self.command_timeout,
            };
        }
        // Hold polls briefly after the command so its invalidations
        // land before the next scheduling pass floods the queue.
        self.scheduler.suspend_for(self.post_busy_cooldown, Instant::now());
        self.queue.push_control(WorkItem::Command {
            command,
            generation: self.connection.generation(),
            done: Some(tx),
        });
        CommandHandle {
            rx,
            timeout: self.command_timeout,
        }
    }

    /// Fetch one kind now, ahead of its schedule, and wait for the
    /// result. If a request for the kind is already outstanding the
    /// call coalesces with it and returns immediately.
    pub fn force_refresh(&mut self, kind: ResourceKind) -> Result<(), CoreError> {
        if !self.connection.is_connected() {
            return Err(CoreError::Disconnected);
        }
        if self.cache.mark_in_flight(kind) {
            debug!(%kind, "refresh already outstanding; coalescing");
            return Ok(());
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.queue.push_control(WorkItem::Poll {
            kind,
            generation: self.connection.generation(),
            requested_at: Instant::now(),
            done: Some(tx),
        });
        match rx.recv_timeout(self.command_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CoreError::Stalled),
            Err(RecvTimeoutError::Disconnected) => Err(CoreError::Disconnected),
        }
    }

    // ── Observability ────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Watch channel that changes on every connection transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Monotonic counter bumped whenever a snapshot changes; the UI
    /// redraws when it moves.
    pub fn refresh_seq(&self) -> u64 {
        *self.refresh_rx.borrow()
    }

    pub fn subscribe_refresh(&self) -> watch::Receiver<u64> {
        self.refresh_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.connection.is_reconnecting()
    }

    /// Soft liveness check: the worker has been stuck inside one
    /// exchange past the stall window.
    pub fn is_stalled(&self) -> bool {
        self.meter.is_stalled(self.stall_window, Instant::now())
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn daemon_version(&self) -> Option<VersionInfo> {
        self.connection.daemon_version()
    }

    pub fn completed_requests(&self) -> u64 {
        self.meter.completed_count()
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn status(&self) -> Arc<CacheEntry<CcStatus>> {
        self.cache.status()
    }

    pub fn projects(&self) -> Arc<CacheEntry<Vec<Project>>> {
        self.cache.projects()
    }

    pub fn tasks(&self) -> Arc<CacheEntry<Vec<Task>>> {
        self.cache.tasks()
    }

    pub fn transfers(&self) -> Arc<CacheEntry<Vec<FileTransfer>>> {
        self.cache.transfers()
    }

    pub fn messages(&self) -> Arc<CacheEntry<MessageLog>> {
        self.cache.messages()
    }

    pub fn notices(&self) -> Arc<CacheEntry<NoticeLog>> {
        self.cache.notices()
    }

    pub fn statistics(&self) -> Arc<CacheEntry<Vec<ProjectStatistics>>> {
        self.cache.statistics()
    }

    pub fn disk_usage(&self) -> Arc<CacheEntry<DiskUsage>> {
        self.cache.disk_usage()
    }

    pub fn acct_mgr_info(&self) -> Arc<CacheEntry<AcctMgrInfo>> {
        self.cache.acct_mgr_info()
    }

    pub fn client_state(&self) -> Arc<CacheEntry<ClientState>> {
        self.cache.client_state()
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop the worker. Waits up to the shutdown grace for the current
    /// exchange to finish; a channel wedged mid-call is abandoned with
    /// its thread rather than blocking the UI's exit.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        info!("shutting down sync engine");
        self.cancel.cancel();
        self.queue.close();
        match self.worker_exit.recv_timeout(self.shutdown_grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("executor thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("executor still blocked at shutdown; detaching");
                drop(handle);
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
