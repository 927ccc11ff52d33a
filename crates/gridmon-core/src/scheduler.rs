// ── Poll scheduler ──
//
// Once per tick, decides which resource kinds are due given per-kind
// minimum intervals, the visible-view mask, the single-outstanding
// rule, and adaptive feedback from measured execution cost. Pure
// policy: building and queuing the work items is the caller's job.

use std::time::{Duration, Instant};

use crate::cache::ResourceCache;
use crate::kind::{ResourceKind, ViewMask};

/// Static per-kind minimum refresh intervals.
///
/// Fast-changing lists refresh on a second scale; credit statistics,
/// disk usage and notices on a minute scale; the full state snapshot
/// hourly (the per-list polls keep it effectively current in between).
#[derive(Debug, Clone)]
pub struct IntervalTable {
    pub status: Duration,
    pub projects: Duration,
    pub tasks: Duration,
    pub transfers: Duration,
    pub messages: Duration,
    pub notices: Duration,
    pub statistics: Duration,
    pub disk_usage: Duration,
    pub acct_mgr_info: Duration,
    pub state: Duration,
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self {
            status: Duration::from_secs(1),
            projects: Duration::from_secs(1),
            tasks: Duration::from_secs(1),
            transfers: Duration::from_secs(1),
            messages: Duration::from_secs(1),
            notices: Duration::from_secs(60),
            statistics: Duration::from_secs(60),
            disk_usage: Duration::from_secs(60),
            acct_mgr_info: Duration::from_secs(600),
            state: Duration::from_secs(3600),
        }
    }
}

impl IntervalTable {
    pub fn for_kind(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Status => self.status,
            ResourceKind::Projects => self.projects,
            ResourceKind::Tasks => self.tasks,
            ResourceKind::Transfers => self.transfers,
            ResourceKind::Messages => self.messages,
            ResourceKind::Notices => self.notices,
            ResourceKind::Statistics => self.statistics,
            ResourceKind::DiskUsage => self.disk_usage,
            ResourceKind::AcctMgrInfo => self.acct_mgr_info,
            ResourceKind::State => self.state,
        }
    }
}

pub(crate) struct PollScheduler {
    intervals: IntervalTable,
    adaptive_multiplier: u32,
    /// Cooldown after a slow request; the scheduler issues nothing
    /// until this passes.
    suspended_until: Option<Instant>,
}

impl PollScheduler {
    pub(crate) fn new(intervals: IntervalTable, adaptive_multiplier: u32) -> Self {
        Self {
            intervals,
            adaptive_multiplier,
            suspended_until: None,
        }
    }

    /// Suspend all scheduling for `cooldown`, measured from `now`.
    pub(crate) fn suspend_for(&mut self, cooldown: Duration, now: Instant) {
        self.suspended_until = Some(now + cooldown);
    }

    /// The kinds due for refresh, in fixed priority order.
    ///
    /// A never-fetched kind is always due and bypasses the visibility
    /// gate (so the first Connected tick populates every slot). A kind
    /// with a request already outstanding is skipped even if overdue.
    pub(crate) fn due_kinds(
        &mut self,
        cache: &ResourceCache,
        views: ViewMask,
        window_visible: bool,
        now: Instant,
    ) -> Vec<ResourceKind> {
        if let Some(until) = self.suspended_until {
            if now < until {
                return Vec::new();
            }
            self.suspended_until = None;
        }

        let mut due = Vec::new();
        for kind in ResourceKind::PRIORITY_ORDER {
            let meta = cache.meta(kind);
            if meta.in_flight {
                continue;
            }

            let Some(fetched_at) = meta.fetched_at else {
                due.push(kind);
                continue;
            };

            if let Some(view) = kind.gating_view() {
                if !window_visible || !views.contains(view) {
                    continue;
                }
            }

            let interval = self.effective_interval(kind, meta.last_execution);
            if now.saturating_duration_since(fetched_at) >= interval {
                due.push(kind);
            }
        }
        due
    }

    /// The task list backs off on a heavily loaded daemon: an expensive
    /// poll stretches its own interval by the adaptive multiplier.
    fn effective_interval(&self, kind: ResourceKind, last_execution: Duration) -> Duration {
        let base = self.intervals.for_kind(kind);
        if kind == ResourceKind::Tasks {
            base.max(last_execution * self.adaptive_multiplier)
        } else {
            base
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kind::ViewKind;
    use gridmon_rpc::model::CcStatus;
    use gridmon_rpc::request::RpcReply;
    use pretty_assertions::assert_eq;

    fn scheduler() -> PollScheduler {
        PollScheduler::new(IntervalTable::default(), 10)
    }

    fn fill_all(cache: &ResourceCache, at: Instant) {
        // Seed every slot so nothing is in the always-due
        // never-fetched case.
        use gridmon_rpc::model::{
            AcctMgrInfo, ClientState, DiskUsage,
        };
        cache.apply_reply(ResourceKind::Status, RpcReply::Status(CcStatus::default()), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::Projects, RpcReply::Projects(vec![]), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::Tasks, RpcReply::Tasks(vec![]), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::Transfers, RpcReply::Transfers(vec![]), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::Messages, RpcReply::Messages(vec![]), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::Notices, RpcReply::Notices(vec![]), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::Statistics, RpcReply::Statistics(vec![]), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::DiskUsage, RpcReply::DiskUsage(DiskUsage::default()), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::AcctMgrInfo, RpcReply::AcctMgrInfo(AcctMgrInfo::default()), at, Duration::ZERO);
        cache.apply_reply(ResourceKind::State, RpcReply::State(ClientState::default()), at, Duration::ZERO);
    }

    #[test]
    fn never_fetched_kinds_are_due_regardless_of_mask() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let due = sched.due_kinds(&cache, ViewMask::NONE, false, Instant::now());
        // Everything is unfetched, so everything is due, in priority order.
        assert_eq!(due, ResourceKind::PRIORITY_ORDER.to_vec());
        assert_eq!(due[0], ResourceKind::Status);
        assert_eq!(due[1], ResourceKind::Messages);
    }

    #[test]
    fn interval_boundary() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let t0 = Instant::now();
        fill_all(&cache, t0);

        let views = ViewMask::single(ViewKind::Tasks);
        let before = sched.due_kinds(&cache, views, true, t0 + Duration::from_millis(500));
        assert!(!before.contains(&ResourceKind::Tasks));

        let after = sched.due_kinds(&cache, views, true, t0 + Duration::from_millis(1100));
        assert!(after.contains(&ResourceKind::Tasks));
    }

    #[test]
    fn messages_stay_due_when_every_view_is_gated_off() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let t0 = Instant::now();
        fill_all(&cache, t0);

        // Window hidden, no views visible: only the ungated kinds poll.
        let due = sched.due_kinds(&cache, ViewMask::NONE, false, t0 + Duration::from_secs(2));
        assert!(due.contains(&ResourceKind::Status));
        assert!(due.contains(&ResourceKind::Messages));
        assert!(!due.contains(&ResourceKind::Tasks));
        assert!(!due.contains(&ResourceKind::Projects));
        assert!(!due.contains(&ResourceKind::Transfers));
        assert!(!due.contains(&ResourceKind::Notices));
        assert!(!due.contains(&ResourceKind::Statistics));
        assert!(!due.contains(&ResourceKind::DiskUsage));
    }

    #[test]
    fn visible_view_unlocks_its_kind() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let t0 = Instant::now();
        fill_all(&cache, t0);

        let now = t0 + Duration::from_secs(120);
        let hidden = sched.due_kinds(&cache, ViewMask::NONE, true, now);
        assert!(!hidden.contains(&ResourceKind::Statistics));

        let shown = sched.due_kinds(&cache, ViewMask::single(ViewKind::Statistics), true, now);
        assert!(shown.contains(&ResourceKind::Statistics));
    }

    #[test]
    fn adaptive_interval_backs_off_expensive_task_polls() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let t0 = Instant::now();
        fill_all(&cache, t0);
        // A 12s task poll with K=10 must not reschedule for 120s.
        cache.apply_reply(ResourceKind::Tasks, RpcReply::Tasks(vec![]), t0, Duration::from_secs(12));

        let views = ViewMask::single(ViewKind::Tasks);
        let early = sched.due_kinds(&cache, views, true, t0 + Duration::from_secs(119));
        assert!(!early.contains(&ResourceKind::Tasks));

        let late = sched.due_kinds(&cache, views, true, t0 + Duration::from_secs(121));
        assert!(late.contains(&ResourceKind::Tasks));
    }

    #[test]
    fn adaptive_rule_applies_only_to_tasks() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let t0 = Instant::now();
        fill_all(&cache, t0);
        cache.apply_reply(ResourceKind::Status, RpcReply::Status(CcStatus::default()), t0, Duration::from_secs(12));

        let due = sched.due_kinds(&cache, ViewMask::NONE, true, t0 + Duration::from_secs(2));
        assert!(due.contains(&ResourceKind::Status));
    }

    #[test]
    fn in_flight_kind_is_skipped_even_when_overdue() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let t0 = Instant::now();
        fill_all(&cache, t0);
        cache.mark_in_flight(ResourceKind::Messages);

        let due = sched.due_kinds(&cache, ViewMask::NONE, true, t0 + Duration::from_secs(10));
        assert!(!due.contains(&ResourceKind::Messages));

        cache.clear_in_flight(ResourceKind::Messages);
        let due = sched.due_kinds(&cache, ViewMask::NONE, true, t0 + Duration::from_secs(10));
        assert!(due.contains(&ResourceKind::Messages));
    }

    #[test]
    fn cooldown_suspends_everything_then_expires() {
        let cache = ResourceCache::new(100);
        let mut sched = scheduler();
        let now = Instant::now();
        sched.suspend_for(Duration::from_secs(3), now);

        assert!(sched.due_kinds(&cache, ViewMask::all(), true, now + Duration::from_secs(1)).is_empty());
        assert!(!sched.due_kinds(&cache, ViewMask::all(), true, now + Duration::from_secs(4)).is_empty());
    }
}
