//! Connection lifecycle state machine.
//!
//! [`ConnectionMachine`] is the single owner of [`ConnectionState`]. It is
//! purely synchronous: the websocket supervisor feeds it transport events
//! and timer expiries and acts on the [`Directive`] it returns. Every event
//! carries the [`Generation`] of the transport (or timer) that produced it;
//! events from a superseded generation are ignored, so a torn-down
//! connection can never resurrect state.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use tokio::time::Instant;

// ── Credentials ──────────────────────────────────────────────────────

/// How the client authenticates on a freshly opened push channel.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Live mode with a server-issued session token.
    Session(SecretString),
    /// Demo mode; the server serves canned state.
    Demo,
}

impl Credentials {
    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Demo)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Reconnection attempts before giving up until the next `start()`.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// `min(initial * 2^attempt, max)`, saturating.
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    config
        .initial_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(config.max_delay)
}

// ── Generation ───────────────────────────────────────────────────────

/// Identity of one transport instance (or one backoff timer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── State & status ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
}

/// Snapshot of the connection, published to consumers on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub is_connected: bool,
    /// Only raised once a session has seen more than one disconnect, so a
    /// single blip does not flash a reconnecting banner.
    pub is_reconnecting: bool,
    /// Terminal failure, set when the attempt ceiling is hit.
    pub error: Option<String>,
    pub attempt: u32,
    pub generation: Generation,
}

/// What the supervisor should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Open a new transport tagged with this generation.
    Connect(Generation),
    /// Sleep, then report [`ConnectionMachine::on_backoff_elapsed`] with this generation.
    Backoff { generation: Generation, delay: Duration },
    /// Attempt ceiling reached; stop retrying.
    GiveUp,
    /// Stale or irrelevant event.
    Ignore,
}

// ── ConnectionMachine ────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConnectionMachine {
    config: ReconnectConfig,
    state: ConnectionState,
    generation: Generation,
    enabled: bool,
    attempt: u32,
    disconnects: u32,
    reconnecting_visible: bool,
    error: Option<String>,
}

impl ConnectionMachine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            generation: Generation::default(),
            enabled: false,
            attempt: 0,
            disconnects: 0,
            reconnecting_visible: false,
            error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.enabled && generation == self.generation
    }

    /// `disconnected → connecting`. Always begins a fresh session: counters
    /// and the terminal error are cleared, and any previous transport is
    /// superseded.
    pub fn start(&mut self) -> Directive {
        self.enabled = true;
        self.attempt = 0;
        self.disconnects = 0;
        self.reconnecting_visible = false;
        self.error = None;
        self.generation = self.generation.next();
        self.state = ConnectionState::Connecting;
        Directive::Connect(self.generation)
    }

    /// Any state `→ disconnected`. Bumps the generation so late events
    /// from the torn-down transport or a pending backoff timer are ignored.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.reconnecting_visible = false;
        self.generation = self.generation.next();
        self.state = ConnectionState::Disconnected;
    }

    /// `connecting → open`. Returns `false` for stale generations.
    pub fn on_open(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        self.attempt = 0;
        self.reconnecting_visible = false;
        self.error = None;
        true
    }

    /// Transport closed or failed to connect.
    pub fn on_closed(&mut self, generation: Generation, reason: &str) -> Directive {
        if !self.is_current(generation)
            || !matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Open
            )
        {
            return Directive::Ignore;
        }

        self.disconnects = self.disconnects.saturating_add(1);

        if self.attempt >= self.config.max_attempts {
            self.enabled = false;
            self.reconnecting_visible = false;
            self.generation = self.generation.next();
            self.state = ConnectionState::Disconnected;
            self.error = Some(format!(
                "connection lost after {} reconnect attempts: {reason}",
                self.attempt
            ));
            return Directive::GiveUp;
        }

        let delay = backoff_delay(self.attempt, &self.config);
        self.attempt += 1;
        self.reconnecting_visible = self.disconnects > 1;
        self.state = ConnectionState::Reconnecting;
        Directive::Backoff { generation, delay }
    }

    /// `reconnecting → connecting` once the backoff delay has passed.
    pub fn on_backoff_elapsed(&mut self, generation: Generation) -> Directive {
        if !self.is_current(generation) || self.state != ConnectionState::Reconnecting {
            return Directive::Ignore;
        }
        self.generation = self.generation.next();
        self.state = ConnectionState::Connecting;
        Directive::Connect(self.generation)
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            is_connected: self.state == ConnectionState::Open,
            is_reconnecting: self.reconnecting_visible
                && matches!(
                    self.state,
                    ConnectionState::Reconnecting | ConnectionState::Connecting
                ),
            error: self.error.clone(),
            attempt: self.attempt,
            generation: self.generation,
        }
    }
}

// ── Heartbeat ────────────────────────────────────────────────────────

/// Default keepalive period.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Heartbeat intervals without any inbound traffic before the link is dead.
pub const HEARTBEAT_MISSED_LIMIT: u32 = 3;

/// Liveness bookkeeping for one open transport.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last_seen: Instant,
}

impl Heartbeat {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_seen: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Any inbound frame counts as proof of life.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_seen = now;
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn is_dead(&self, now: Instant) -> bool {
        self.silence(now) >= self.interval.saturating_mul(HEARTBEAT_MISSED_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(machine: &mut ConnectionMachine) -> Directive {
        let generation = machine.generation();
        machine.on_closed(generation, "refused")
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        assert_eq!(backoff_delay(4, &config), Duration::from_secs(16));
        assert_eq!(backoff_delay(5, &config), Duration::from_secs(30));
        assert_eq!(backoff_delay(40, &config), Duration::from_secs(30));
    }

    #[test]
    fn three_failures_back_off_one_two_four_seconds() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        assert!(matches!(machine.start(), Directive::Connect(_)));

        let mut delays = Vec::new();
        for _ in 0..3 {
            let Directive::Backoff { generation, delay } = fail(&mut machine) else {
                panic!("expected a backoff directive");
            };
            delays.push(delay.as_millis());
            assert!(matches!(
                machine.on_backoff_elapsed(generation),
                Directive::Connect(_)
            ));
        }

        assert_eq!(delays, vec![1000, 2000, 4000]);
    }

    #[test]
    fn gives_up_after_ceiling_and_start_resets() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        machine.start();

        for _ in 0..5 {
            let Directive::Backoff { generation, .. } = fail(&mut machine) else {
                panic!("expected a backoff directive");
            };
            machine.on_backoff_elapsed(generation);
        }
        assert_eq!(fail(&mut machine), Directive::GiveUp);

        let status = machine.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(!status.is_reconnecting);
        assert!(status.error.as_deref().unwrap_or_default().contains("refused"));

        machine.start();
        let status = machine.status();
        assert_eq!(status.state, ConnectionState::Connecting);
        assert!(status.error.is_none());
        let Directive::Backoff { delay, .. } = fail(&mut machine) else {
            panic!("expected a backoff directive");
        };
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn first_disconnect_is_silent_second_is_not() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        let Directive::Connect(first) = machine.start() else {
            panic!("expected connect");
        };
        assert!(machine.on_open(first));
        assert!(machine.status().is_connected);

        let Directive::Backoff { generation, .. } = machine.on_closed(first, "reset") else {
            panic!("expected a backoff directive");
        };
        let status = machine.status();
        assert_eq!(status.state, ConnectionState::Reconnecting);
        assert!(!status.is_connected);
        assert!(!status.is_reconnecting);

        let Directive::Connect(second) = machine.on_backoff_elapsed(generation) else {
            panic!("expected connect");
        };
        assert!(machine.on_open(second));
        assert!(!machine.status().is_reconnecting);

        machine.on_closed(second, "reset");
        assert!(machine.status().is_reconnecting);
    }

    #[test]
    fn failed_retry_after_blip_is_visible() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        let Directive::Connect(first) = machine.start() else {
            panic!("expected connect");
        };
        machine.on_open(first);
        let Directive::Backoff { generation, .. } = machine.on_closed(first, "reset") else {
            panic!("expected a backoff directive");
        };
        machine.on_backoff_elapsed(generation);
        fail(&mut machine);
        assert!(machine.status().is_reconnecting);
    }

    #[test]
    fn open_resets_attempts() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        machine.start();
        let Directive::Backoff { generation, .. } = fail(&mut machine) else {
            panic!("expected a backoff directive");
        };
        let Directive::Connect(next) = machine.on_backoff_elapsed(generation) else {
            panic!("expected connect");
        };
        assert_eq!(machine.status().attempt, 1);
        machine.on_open(next);
        assert_eq!(machine.status().attempt, 0);
    }

    #[test]
    fn stale_generation_events_are_ignored() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        let Directive::Connect(old) = machine.start() else {
            panic!("expected connect");
        };
        machine.on_open(old);

        // A fresh start supersedes the previous transport.
        let Directive::Connect(new) = machine.start() else {
            panic!("expected connect");
        };
        assert!(new > old);

        assert!(!machine.on_open(old));
        assert_eq!(machine.on_closed(old, "late close"), Directive::Ignore);
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn stop_suppresses_late_callbacks_and_timers() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        let Directive::Connect(first) = machine.start() else {
            panic!("expected connect");
        };
        machine.on_open(first);
        let Directive::Backoff { generation, .. } = machine.on_closed(first, "reset") else {
            panic!("expected a backoff directive");
        };

        machine.stop();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.on_backoff_elapsed(generation), Directive::Ignore);
        assert_eq!(machine.on_closed(generation, "late"), Directive::Ignore);
        assert!(!machine.on_open(generation));
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn duplicate_close_is_ignored() {
        let mut machine = ConnectionMachine::new(ReconnectConfig::default());
        let Directive::Connect(first) = machine.start() else {
            panic!("expected connect");
        };
        machine.on_open(first);
        assert!(matches!(
            machine.on_closed(first, "reset"),
            Directive::Backoff { .. }
        ));
        assert_eq!(machine.on_closed(first, "reset again"), Directive::Ignore);
        assert_eq!(machine.status().attempt, 1);
    }

    #[test]
    fn heartbeat_dies_after_three_silent_intervals() {
        let t0 = Instant::now();
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30), t0);

        assert!(!heartbeat.is_dead(t0 + Duration::from_secs(89)));
        assert!(heartbeat.is_dead(t0 + Duration::from_secs(90)));

        heartbeat.record_activity(t0 + Duration::from_secs(60));
        assert!(!heartbeat.is_dead(t0 + Duration::from_secs(90)));
        assert_eq!(
            heartbeat.silence(t0 + Duration::from_secs(90)),
            Duration::from_secs(30)
        );
    }
}
