// ── Engine tuning ──
//
// Runtime knobs for one engine instance. Built by the embedding UI
// (usually from gridmon-config) and passed to `Monitor::new`; the
// engine never reads configuration files itself.

use std::time::Duration;

use gridmon_rpc::model::VersionInfo;

use crate::scheduler::IntervalTable;

/// Tuning for one `Monitor` instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-kind minimum refresh intervals.
    pub intervals: IntervalTable,

    /// Adaptive backoff multiplier K for the task list: its effective
    /// interval is `max(base, last_execution * K)`. Empirical default;
    /// tune against real daemon latency.
    pub adaptive_multiplier: u32,

    /// How long to keep retrying the initial connect to a *local*
    /// daemon that may still be starting up.
    pub local_start_grace: Duration,

    /// Bounded wait for command completion and forced refreshes.
    pub command_timeout: Duration,

    /// Bounded wait for the worker thread to exit on shutdown.
    pub shutdown_grace: Duration,

    /// Tick suppression after a modal "please wait" interaction ends.
    pub post_busy_cooldown: Duration,

    /// A request at least this slow counts as a slow request and
    /// triggers the scheduler cooldown.
    pub slow_request_threshold: Duration,

    /// How long the scheduler issues nothing after a slow request.
    pub slow_request_cooldown: Duration,

    /// If no request completes within this window while one is in
    /// flight, the engine reports itself stalled.
    pub stall_window: Duration,

    /// Automatically re-enter Reconnecting from transport-class errors
    /// on the next tick. Auth failures never auto-reconnect.
    pub reconnect_on_error: bool,

    /// Client-side cap on retained messages and notices.
    pub message_buffer_cap: usize,

    /// Language tag forwarded to the daemon after connecting, if any.
    pub language: Option<String>,

    /// Version reported during the handshake.
    pub client_version: VersionInfo,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intervals: IntervalTable::default(),
            adaptive_multiplier: 10,
            local_start_grace: Duration::from_secs(60),
            command_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            post_busy_cooldown: Duration::from_secs(2),
            slow_request_threshold: Duration::from_secs(5),
            slow_request_cooldown: Duration::from_secs(3),
            stall_window: Duration::from_secs(30),
            reconnect_on_error: false,
            message_buffer_cap: 2000,
            language: None,
            client_version: VersionInfo::new(1, 0, 0),
        }
    }
}
