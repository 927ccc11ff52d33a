// ── Connection state machine ──
//
// Owns the logical connection: target, credential, authentication,
// retry policy, and the observable `ConnectionState`. All mutation
// happens on the poll-driving thread; the executor's worker reports
// outcomes through `EngineEvent`s rather than touching state directly,
// so no lock is needed here.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use gridmon_rpc::channel::ConnectTarget;
use gridmon_rpc::model::VersionInfo;

use crate::cache::ResourceCache;
use crate::error::CoreError;
use crate::executor::{EngineEvent, RequestQueue, WorkItem};

/// Why the connection is in the Error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// Wrong RPC password. The flag distinguishes "no password was
    /// configured" from "the configured password was rejected"; the
    /// UI's remediation differs.
    AuthFailed { used_default_credential: bool },
    /// Transport-level failure after retries were exhausted.
    ConnectFailed,
    /// Daemon speaks an incompatible protocol generation.
    VersionMismatch,
    /// A local daemon asked the manager to exit.
    DaemonRequestedShutdown,
}

/// Observable lifecycle of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Authorizing,
    Connected,
    Reconnecting,
    Error(ConnectionError),
}

pub(crate) struct ConnectionStateMachine {
    state_tx: watch::Sender<ConnectionState>,
    target: Option<ConnectTarget>,
    password: SecretString,
    used_default_credential: bool,
    daemon_version: Option<VersionInfo>,
    /// Bumped on every connect/disconnect so results from a previous
    /// incarnation of the channel are recognizably stale.
    generation: u64,
    reconnect_on_error: bool,
    local_start_grace: Duration,
    language: Option<String>,
    client_version: VersionInfo,
}

impl ConnectionStateMachine {
    pub(crate) fn new(
        reconnect_on_error: bool,
        local_start_grace: Duration,
        language: Option<String>,
        client_version: VersionInfo,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state_tx,
            target: None,
            password: SecretString::from(String::new()),
            used_default_credential: true,
            daemon_version: None,
            generation: 0,
            reconnect_on_error,
            local_start_grace,
            language,
            client_version,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub(crate) fn is_reconnecting(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Reconnecting | ConnectionState::Authorizing
        )
    }

    pub(crate) fn is_local(&self) -> bool {
        self.target.as_ref().is_some_and(ConnectTarget::is_local)
    }

    pub(crate) fn daemon_version(&self) -> Option<VersionInfo> {
        self.daemon_version
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    // ── Commands from the facade ─────────────────────────────────────

    /// Begin connecting. An empty host means the local daemon. Calling
    /// again before completion supersedes the previous attempt (last
    /// call wins; the generation bump invalidates the earlier one).
    pub(crate) fn connect(
        &mut self,
        host: &str,
        port: u16,
        password: SecretString,
        reset_full_state: bool,
        cache: &ResourceCache,
        queue: &RequestQueue,
    ) {
        let host = host.trim();
        let target = if host.is_empty() {
            ConnectTarget::local(port)
        } else {
            ConnectTarget::new(host, port)
        };
        info!(%target, reset_full_state, "connect requested");

        self.used_default_credential = password.expose_secret().is_empty();
        self.password = password;
        self.target = Some(target);
        self.daemon_version = None;
        if reset_full_state {
            cache.invalidate_all();
        }
        self.begin_authorizing(queue);
    }

    /// Drop the current channel and re-run the handshake with the
    /// last-known-good credential. The handshake itself is enqueued on
    /// the next `poll()`.
    pub(crate) fn reconnect(&mut self, cache: &ResourceCache) {
        if self.target.is_none() {
            debug!("reconnect requested with no target; ignored");
            return;
        }
        // Stale success codes must not read as current after the cycle,
        // and neither must the old daemon's version.
        cache.invalidate_all();
        self.daemon_version = None;
        self.set_state(ConnectionState::Reconnecting);
    }

    pub(crate) fn disconnect(&mut self, queue: &RequestQueue) {
        self.generation += 1;
        queue.push_control(WorkItem::Close);
        self.daemon_version = None;
        self.set_state(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    fn begin_authorizing(&mut self, queue: &RequestQueue) {
        let Some(target) = self.target.clone() else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };
        self.generation += 1;
        // Local daemons get a startup grace window instead of an
        // immediate failure.
        let grace_deadline = target
            .is_local()
            .then(|| std::time::Instant::now() + self.local_start_grace);
        queue.push_control(WorkItem::Establish {
            target,
            password: self.password.clone(),
            used_default: self.used_default_credential,
            grace_deadline,
            generation: self.generation,
            language: self.language.clone(),
            client_version: self.client_version,
        });
        self.set_state(ConnectionState::Authorizing);
    }

    // ── Tick-driven transitions ──────────────────────────────────────

    /// At most one transition's worth of work per call; never blocks.
    pub(crate) fn poll(&mut self, queue: &RequestQueue) {
        match self.state() {
            ConnectionState::Reconnecting => self.begin_authorizing(queue),
            ConnectionState::Error(ConnectionError::ConnectFailed) if self.reconnect_on_error => {
                // Only transport-class errors auto-retry; auth failures
                // wait for a new credential, a shutdown request is final.
                self.set_state(ConnectionState::Reconnecting);
            }
            _ => {}
        }
    }

    /// Apply one worker event. Returns `true` when the event means the
    /// manager process itself must exit.
    pub(crate) fn handle_event(&mut self, event: EngineEvent, cache: &ResourceCache) -> bool {
        match event {
            EngineEvent::Established {
                version,
                generation,
            } => {
                if generation != self.generation {
                    debug!("stale establish result ignored");
                    return false;
                }
                self.daemon_version = Some(version);
                // Force an immediate refresh of everything.
                cache.invalidate_all();
                self.set_state(ConnectionState::Connected);
                info!(%version, "daemon connection established");
            }
            EngineEvent::EstablishFailed { error, generation } => {
                if generation != self.generation {
                    debug!("stale establish failure ignored");
                    return false;
                }
                let cause = match error {
                    CoreError::AuthFailed {
                        used_default_credential,
                    } => ConnectionError::AuthFailed {
                        used_default_credential,
                    },
                    CoreError::VersionMismatch { .. } => ConnectionError::VersionMismatch,
                    _ => ConnectionError::ConnectFailed,
                };
                warn!(error = %error, "handshake failed");
                self.set_state(ConnectionState::Error(cause));
            }
            EngineEvent::ChannelBroken { generation } => {
                if generation == self.generation && self.state() == ConnectionState::Connected {
                    warn!("channel broken; reconnecting");
                    cache.invalidate_all();
                    self.set_state(ConnectionState::Reconnecting);
                }
            }
            EngineEvent::DaemonRequestedShutdown => {
                if self.is_local() {
                    info!("local daemon requested manager shutdown");
                    self.set_state(ConnectionState::Error(
                        ConnectionError::DaemonRequestedShutdown,
                    ));
                    return true;
                }
            }
            EngineEvent::SlowRequest { .. } => {
                // Scheduler concern; handled by the facade.
            }
        }
        false
    }
}
