// ── Resource cache ──
//
// One slot per ResourceKind holding the last successfully decoded
// snapshot, the time of the request that produced it, and the last
// result code. Slots are `ArcSwap`s: readers always load one whole
// consistent entry, never a half-written value, and the UI thread
// never blocks on I/O. Written by the executor's worker thread;
// invalidated from the poll-driving thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use strum::IntoEnumIterator;
use tracing::warn;

use gridmon_rpc::error::ResultCode;
use gridmon_rpc::model::{
    AcctMgrInfo, CcStatus, ClientState, DiskUsage, FileTransfer, Message, Notice, Project,
    ProjectStatistics, Task,
};
use gridmon_rpc::request::RpcReply;

use crate::kind::ResourceKind;

/// One cached snapshot plus its provenance. `fetched_at` is the time
/// the producing request was *issued*; `None` means never fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub snapshot: Arc<T>,
    pub fetched_at: Option<Instant>,
    pub result_code: ResultCode,
    pub last_execution: Duration,
}

impl<T> CacheEntry<T> {
    /// Age of the snapshot relative to `now`, or `None` if never fetched.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.fetched_at.map(|t| now.saturating_duration_since(t))
    }
}

/// Accumulated daemon log messages, fetched incrementally by seqno.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    pub entries: Vec<Message>,
}

impl MessageLog {
    pub fn last_seqno(&self) -> u64 {
        self.entries.last().map_or(0, |m| m.seqno)
    }
}

/// Accumulated notices, fetched incrementally by seqno.
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    pub entries: Vec<Notice>,
}

impl NoticeLog {
    pub fn last_seqno(&self) -> u64 {
        self.entries.last().map_or(0, |n| n.seqno)
    }
}

/// Scheduler-facing view of a slot's bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct SlotMeta {
    pub fetched_at: Option<Instant>,
    pub result_code: ResultCode,
    pub last_execution: Duration,
    pub in_flight: bool,
}

// ── Slot ─────────────────────────────────────────────────────────────

struct Slot<T> {
    entry: ArcSwap<CacheEntry<T>>,
    /// One outstanding request per kind; set when a request is queued,
    /// cleared when its result (or failure) lands.
    in_flight: AtomicBool,
}

impl<T: Default> Slot<T> {
    fn new() -> Self {
        Self {
            entry: ArcSwap::from_pointee(CacheEntry {
                snapshot: Arc::new(T::default()),
                fetched_at: None,
                result_code: ResultCode::SUCCESS,
                last_execution: Duration::ZERO,
            }),
            in_flight: AtomicBool::new(false),
        }
    }
}

impl<T> Slot<T> {
    fn read(&self) -> Arc<CacheEntry<T>> {
        self.entry.load_full()
    }

    fn meta(&self) -> SlotMeta {
        let entry = self.entry.load();
        SlotMeta {
            fetched_at: entry.fetched_at,
            result_code: entry.result_code,
            last_execution: entry.last_execution,
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }

    /// Replace the snapshot. Rejected (returning `false`) if the slot
    /// already holds a result from a later request, so writes are
    /// timestamp-monotonic per kind.
    fn store_success(&self, snapshot: Arc<T>, requested_at: Instant, execution: Duration) -> bool {
        let mut stored = false;
        self.entry.rcu(|current| {
            if current.fetched_at.is_some_and(|t| t > requested_at) {
                stored = false;
                Arc::clone(current)
            } else {
                stored = true;
                Arc::new(CacheEntry {
                    snapshot: Arc::clone(&snapshot),
                    fetched_at: Some(requested_at),
                    result_code: ResultCode::SUCCESS,
                    last_execution: execution,
                })
            }
        });
        self.in_flight.store(false, Ordering::Release);
        stored
    }

    /// Record a failed fetch: the stale snapshot stays visible, only
    /// the result code and timing change.
    fn store_failure(&self, code: ResultCode, requested_at: Instant, execution: Duration) {
        self.entry.rcu(|current| {
            if current.fetched_at.is_some_and(|t| t > requested_at) {
                Arc::clone(current)
            } else {
                Arc::new(CacheEntry {
                    snapshot: Arc::clone(&current.snapshot),
                    fetched_at: Some(requested_at),
                    result_code: code,
                    last_execution: execution,
                })
            }
        });
        self.in_flight.store(false, Ordering::Release);
    }

    /// Back to "never fetched". Keeps the snapshot (stale data beats a
    /// blank UI) but clears the result code and the in-flight flag.
    fn invalidate(&self) {
        self.entry.rcu(|current| {
            Arc::new(CacheEntry {
                snapshot: Arc::clone(&current.snapshot),
                fetched_at: None,
                result_code: ResultCode::SUCCESS,
                last_execution: current.last_execution,
            })
        });
        self.in_flight.store(false, Ordering::Release);
    }

    fn mark_in_flight(&self) -> bool {
        self.in_flight.swap(true, Ordering::AcqRel)
    }

    fn clear_in_flight(&self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

// ── ResourceCache ────────────────────────────────────────────────────

/// The engine's cache: one typed slot per `ResourceKind`, a struct
/// rather than a map so refresh policy stays exhaustive.
pub struct ResourceCache {
    status: Slot<CcStatus>,
    projects: Slot<Vec<Project>>,
    tasks: Slot<Vec<Task>>,
    transfers: Slot<Vec<FileTransfer>>,
    messages: Slot<MessageLog>,
    notices: Slot<NoticeLog>,
    statistics: Slot<Vec<ProjectStatistics>>,
    disk_usage: Slot<DiskUsage>,
    acct_mgr_info: Slot<AcctMgrInfo>,
    client_state: Slot<ClientState>,
    log_cap: usize,
}

impl ResourceCache {
    pub fn new(log_cap: usize) -> Self {
        Self {
            status: Slot::new(),
            projects: Slot::new(),
            tasks: Slot::new(),
            transfers: Slot::new(),
            messages: Slot::new(),
            notices: Slot::new(),
            statistics: Slot::new(),
            disk_usage: Slot::new(),
            acct_mgr_info: Slot::new(),
            client_state: Slot::new(),
            log_cap,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn status(&self) -> Arc<CacheEntry<CcStatus>> {
        self.status.read()
    }

    pub fn projects(&self) -> Arc<CacheEntry<Vec<Project>>> {
        self.projects.read()
    }

    pub fn tasks(&self) -> Arc<CacheEntry<Vec<Task>>> {
        self.tasks.read()
    }

    pub fn transfers(&self) -> Arc<CacheEntry<Vec<FileTransfer>>> {
        self.transfers.read()
    }

    pub fn messages(&self) -> Arc<CacheEntry<MessageLog>> {
        self.messages.read()
    }

    pub fn notices(&self) -> Arc<CacheEntry<NoticeLog>> {
        self.notices.read()
    }

    pub fn statistics(&self) -> Arc<CacheEntry<Vec<ProjectStatistics>>> {
        self.statistics.read()
    }

    pub fn disk_usage(&self) -> Arc<CacheEntry<DiskUsage>> {
        self.disk_usage.read()
    }

    pub fn acct_mgr_info(&self) -> Arc<CacheEntry<AcctMgrInfo>> {
        self.acct_mgr_info.read()
    }

    pub fn client_state(&self) -> Arc<CacheEntry<ClientState>> {
        self.client_state.read()
    }

    // ── Bookkeeping ──────────────────────────────────────────────────

    pub(crate) fn meta(&self, kind: ResourceKind) -> SlotMeta {
        match kind {
            ResourceKind::Status => self.status.meta(),
            ResourceKind::Projects => self.projects.meta(),
            ResourceKind::Tasks => self.tasks.meta(),
            ResourceKind::Transfers => self.transfers.meta(),
            ResourceKind::Messages => self.messages.meta(),
            ResourceKind::Notices => self.notices.meta(),
            ResourceKind::Statistics => self.statistics.meta(),
            ResourceKind::DiskUsage => self.disk_usage.meta(),
            ResourceKind::AcctMgrInfo => self.acct_mgr_info.meta(),
            ResourceKind::State => self.client_state.meta(),
        }
    }

    /// Flag a kind as having a queued request. Returns the previous
    /// value, so `true` means one was already outstanding.
    pub(crate) fn mark_in_flight(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Status => self.status.mark_in_flight(),
            ResourceKind::Projects => self.projects.mark_in_flight(),
            ResourceKind::Tasks => self.tasks.mark_in_flight(),
            ResourceKind::Transfers => self.transfers.mark_in_flight(),
            ResourceKind::Messages => self.messages.mark_in_flight(),
            ResourceKind::Notices => self.notices.mark_in_flight(),
            ResourceKind::Statistics => self.statistics.mark_in_flight(),
            ResourceKind::DiskUsage => self.disk_usage.mark_in_flight(),
            ResourceKind::AcctMgrInfo => self.acct_mgr_info.mark_in_flight(),
            ResourceKind::State => self.client_state.mark_in_flight(),
        }
    }

    pub(crate) fn clear_in_flight(&self, kind: ResourceKind) {
        match kind {
            ResourceKind::Status => self.status.clear_in_flight(),
            ResourceKind::Projects => self.projects.clear_in_flight(),
            ResourceKind::Tasks => self.tasks.clear_in_flight(),
            ResourceKind::Messages => self.messages.clear_in_flight(),
            ResourceKind::Transfers => self.transfers.clear_in_flight(),
            ResourceKind::Notices => self.notices.clear_in_flight(),
            ResourceKind::Statistics => self.statistics.clear_in_flight(),
            ResourceKind::DiskUsage => self.disk_usage.clear_in_flight(),
            ResourceKind::AcctMgrInfo => self.acct_mgr_info.clear_in_flight(),
            ResourceKind::State => self.client_state.clear_in_flight(),
        }
    }

    /// Force the next tick to treat `kind` as overdue.
    pub fn invalidate(&self, kind: ResourceKind) {
        match kind {
            ResourceKind::Status => self.status.invalidate(),
            ResourceKind::Projects => self.projects.invalidate(),
            ResourceKind::Tasks => self.tasks.invalidate(),
            ResourceKind::Transfers => self.transfers.invalidate(),
            ResourceKind::Messages => self.messages.invalidate(),
            ResourceKind::Notices => self.notices.invalidate(),
            ResourceKind::Statistics => self.statistics.invalidate(),
            ResourceKind::DiskUsage => self.disk_usage.invalidate(),
            ResourceKind::AcctMgrInfo => self.acct_mgr_info.invalidate(),
            ResourceKind::State => self.client_state.invalidate(),
        }
    }

    /// Full reset: every slot back to "never fetched". Used on connect,
    /// reconnect, and channel breakage so stale success codes are never
    /// shown as current.
    pub fn invalidate_all(&self) {
        for kind in ResourceKind::iter() {
            self.invalidate(kind);
        }
    }

    // ── Write path (worker thread) ───────────────────────────────────

    /// Publish a decoded reply into the slot for `kind`. Returns
    /// `false` if the reply shape does not belong to the kind (the
    /// slot then records a failure instead).
    pub(crate) fn apply_reply(
        &self,
        kind: ResourceKind,
        reply: RpcReply,
        requested_at: Instant,
        execution: Duration,
    ) -> bool {
        match (kind, reply) {
            (ResourceKind::Status, RpcReply::Status(status)) => {
                self.status
                    .store_success(Arc::new(status), requested_at, execution);
            }
            (ResourceKind::Projects, RpcReply::Projects(projects)) => {
                self.projects
                    .store_success(Arc::new(projects), requested_at, execution);
            }
            (ResourceKind::Tasks, RpcReply::Tasks(tasks)) => {
                self.tasks
                    .store_success(Arc::new(tasks), requested_at, execution);
            }
            (ResourceKind::Transfers, RpcReply::Transfers(transfers)) => {
                self.transfers
                    .store_success(Arc::new(transfers), requested_at, execution);
            }
            (ResourceKind::Messages, RpcReply::Messages(batch)) => {
                let merged = self.merge_messages(&batch);
                self.messages
                    .store_success(Arc::new(merged), requested_at, execution);
            }
            (ResourceKind::Notices, RpcReply::Notices(batch)) => {
                let merged = self.merge_notices(&batch);
                self.notices
                    .store_success(Arc::new(merged), requested_at, execution);
            }
            (ResourceKind::Statistics, RpcReply::Statistics(stats)) => {
                self.statistics
                    .store_success(Arc::new(stats), requested_at, execution);
            }
            (ResourceKind::DiskUsage, RpcReply::DiskUsage(usage)) => {
                self.disk_usage
                    .store_success(Arc::new(usage), requested_at, execution);
            }
            (ResourceKind::AcctMgrInfo, RpcReply::AcctMgrInfo(info)) => {
                self.acct_mgr_info
                    .store_success(Arc::new(info), requested_at, execution);
            }
            (ResourceKind::State, RpcReply::State(state)) => {
                self.client_state
                    .store_success(Arc::new(state), requested_at, execution);
            }
            (kind, reply) => {
                warn!(%kind, reply = ?std::mem::discriminant(&reply), "reply shape does not match resource kind");
                self.record_failure(kind, ResultCode::READ_FAILED, requested_at, execution);
                return false;
            }
        }
        true
    }

    /// Record a failed fetch; the stale snapshot stays visible with
    /// the result code exposed for staleness indication.
    pub(crate) fn record_failure(
        &self,
        kind: ResourceKind,
        code: ResultCode,
        requested_at: Instant,
        execution: Duration,
    ) {
        match kind {
            ResourceKind::Status => self.status.store_failure(code, requested_at, execution),
            ResourceKind::Projects => self.projects.store_failure(code, requested_at, execution),
            ResourceKind::Tasks => self.tasks.store_failure(code, requested_at, execution),
            ResourceKind::Transfers => self.transfers.store_failure(code, requested_at, execution),
            ResourceKind::Messages => self.messages.store_failure(code, requested_at, execution),
            ResourceKind::Notices => self.notices.store_failure(code, requested_at, execution),
            ResourceKind::Statistics => {
                self.statistics.store_failure(code, requested_at, execution);
            }
            ResourceKind::DiskUsage => {
                self.disk_usage.store_failure(code, requested_at, execution);
            }
            ResourceKind::AcctMgrInfo => {
                self.acct_mgr_info
                    .store_failure(code, requested_at, execution);
            }
            ResourceKind::State => {
                self.client_state
                    .store_failure(code, requested_at, execution);
            }
        }
    }

    /// Append a fetched batch after the highest seqno already held,
    /// trimming the front to the client-side cap.
    fn merge_messages(&self, batch: &[Message]) -> MessageLog {
        let current = self.messages.read();
        let last = current.snapshot.last_seqno();
        let mut entries = current.snapshot.entries.clone();
        entries.extend(batch.iter().filter(|m| m.seqno > last).cloned());
        if entries.len() > self.log_cap {
            entries.drain(..entries.len() - self.log_cap);
        }
        MessageLog { entries }
    }

    fn merge_notices(&self, batch: &[Notice]) -> NoticeLog {
        let current = self.notices.read();
        let last = current.snapshot.last_seqno();
        let mut entries = current.snapshot.entries.clone();
        entries.extend(batch.iter().filter(|n| n.seqno > last).cloned());
        if entries.len() > self.log_cap {
            entries.drain(..entries.len() - self.log_cap);
        }
        NoticeLog { entries }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gridmon_rpc::model::MessagePriority;
    use pretty_assertions::assert_eq;

    fn message(seqno: u64) -> Message {
        Message {
            seqno,
            project: String::new(),
            priority: MessagePriority::Info,
            timestamp: Utc::now(),
            body: format!("message {seqno}"),
        }
    }

    #[test]
    fn fresh_cache_has_never_fetched_slots() {
        let cache = ResourceCache::new(100);
        for kind in ResourceKind::iter() {
            let meta = cache.meta(kind);
            assert_eq!(meta.fetched_at, None, "{kind} should start unfetched");
            assert!(!meta.in_flight);
        }
    }

    #[test]
    fn successful_write_is_visible_atomically() {
        let cache = ResourceCache::new(100);
        let t0 = Instant::now();
        cache.apply_reply(
            ResourceKind::Status,
            RpcReply::Status(CcStatus {
                manager_must_quit: true,
                ..CcStatus::default()
            }),
            t0,
            Duration::from_millis(5),
        );

        let entry = cache.status();
        assert!(entry.snapshot.manager_must_quit);
        assert_eq!(entry.fetched_at, Some(t0));
        assert_eq!(entry.result_code, ResultCode::SUCCESS);
        assert_eq!(entry.last_execution, Duration::from_millis(5));
    }

    #[test]
    fn writes_are_timestamp_monotonic() {
        let cache = ResourceCache::new(100);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);

        cache.apply_reply(
            ResourceKind::Tasks,
            RpcReply::Tasks(vec![Task::default(), Task::default()]),
            t1,
            Duration::ZERO,
        );
        // A result from an older request must not clobber the newer one.
        cache.apply_reply(ResourceKind::Tasks, RpcReply::Tasks(vec![]), t0, Duration::ZERO);

        let entry = cache.tasks();
        assert_eq!(entry.snapshot.len(), 2);
        assert_eq!(entry.fetched_at, Some(t1));
    }

    #[test]
    fn failure_keeps_stale_snapshot() {
        let cache = ResourceCache::new(100);
        let t0 = Instant::now();
        cache.apply_reply(
            ResourceKind::Projects,
            RpcReply::Projects(vec![Project::default()]),
            t0,
            Duration::ZERO,
        );
        cache.record_failure(
            ResourceKind::Projects,
            ResultCode(-42),
            t0 + Duration::from_secs(1),
            Duration::ZERO,
        );

        let entry = cache.projects();
        assert_eq!(entry.snapshot.len(), 1, "stale data beats a blank UI");
        assert_eq!(entry.result_code, ResultCode(-42));
    }

    #[test]
    fn invalidate_resets_staleness_but_keeps_snapshot() {
        let cache = ResourceCache::new(100);
        cache.apply_reply(
            ResourceKind::Projects,
            RpcReply::Projects(vec![Project::default()]),
            Instant::now(),
            Duration::ZERO,
        );
        cache.invalidate(ResourceKind::Projects);

        let entry = cache.projects();
        assert_eq!(entry.fetched_at, None);
        assert_eq!(entry.result_code, ResultCode::SUCCESS);
        assert_eq!(entry.snapshot.len(), 1);
    }

    #[test]
    fn invalidate_all_clears_every_slot_and_in_flight_flag() {
        let cache = ResourceCache::new(100);
        let now = Instant::now();
        cache.apply_reply(ResourceKind::Status, RpcReply::Status(CcStatus::default()), now, Duration::ZERO);
        assert!(!cache.mark_in_flight(ResourceKind::Tasks));

        cache.invalidate_all();
        for kind in ResourceKind::iter() {
            let meta = cache.meta(kind);
            assert_eq!(meta.fetched_at, None);
            assert!(!meta.in_flight);
        }
    }

    #[test]
    fn messages_accumulate_by_seqno() {
        let cache = ResourceCache::new(100);
        let t0 = Instant::now();
        cache.apply_reply(
            ResourceKind::Messages,
            RpcReply::Messages(vec![message(1), message(2)]),
            t0,
            Duration::ZERO,
        );
        // Overlapping batch: seqno 2 must not be double-counted.
        cache.apply_reply(
            ResourceKind::Messages,
            RpcReply::Messages(vec![message(2), message(3)]),
            t0 + Duration::from_secs(1),
            Duration::ZERO,
        );

        let log = cache.messages();
        let seqnos: Vec<u64> = log.snapshot.entries.iter().map(|m| m.seqno).collect();
        assert_eq!(seqnos, vec![1, 2, 3]);
        assert_eq!(log.snapshot.last_seqno(), 3);
    }

    #[test]
    fn message_log_is_bounded() {
        let cache = ResourceCache::new(3);
        let batch: Vec<Message> = (1..=10).map(message).collect();
        cache.apply_reply(
            ResourceKind::Messages,
            RpcReply::Messages(batch),
            Instant::now(),
            Duration::ZERO,
        );

        let log = cache.messages();
        let seqnos: Vec<u64> = log.snapshot.entries.iter().map(|m| m.seqno).collect();
        assert_eq!(seqnos, vec![8, 9, 10]);
    }

    #[test]
    fn mismatched_reply_records_failure() {
        let cache = ResourceCache::new(100);
        let ok = cache.apply_reply(
            ResourceKind::Tasks,
            RpcReply::Status(CcStatus::default()),
            Instant::now(),
            Duration::ZERO,
        );
        assert!(!ok);
        assert_eq!(cache.meta(ResourceKind::Tasks).result_code, ResultCode::READ_FAILED);
    }

    #[test]
    fn in_flight_flag_round_trips() {
        let cache = ResourceCache::new(100);
        assert!(!cache.mark_in_flight(ResourceKind::Notices));
        assert!(cache.mark_in_flight(ResourceKind::Notices));
        assert!(cache.meta(ResourceKind::Notices).in_flight);

        cache.clear_in_flight(ResourceKind::Notices);
        assert!(!cache.meta(ResourceKind::Notices).in_flight);
    }
}
