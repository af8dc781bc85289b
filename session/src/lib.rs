//! # Session
//!
//! One run of the embedded runtime, from start to stop.
//!
//! ## Philosophy
//!
//! - **Fresh state per run**: every session builds its own compositor,
//!   input bridge, and log tail; nothing from a prior run leaks in
//! - **Stop is cooperative, then forced**: the runtime gets the stop
//!   sentinel and a bounded grace period to exit; after that the session is
//!   finished regardless
//! - **Subscriptions are per-session**: log streams carry the session id,
//!   and a stale id is refused instead of silently serving the wrong run
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - The runtime's process management (spawning and argument construction
//!   are the embedder's job)
//! - A settings store
//! - A UI shell

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use broadcast::Subscriber;
use compositor::Compositor;
use display_types::{DisplayEvent, SessionId};
use engine_abi::HostDriver;
use host_logger::LogSink;
use input_bridge::InputBridge;
use log_tail::{LogLine, LogTail, TailError};
use thiserror::Error;

/// Default grace period a stopping runtime gets to observe the stop sentinel
const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(500);

/// How often the stop loop re-checks the runtime while waiting out the grace
const STOP_POLL: Duration = Duration::from_millis(5);

/// Session error types
#[derive(Debug, Error)]
pub enum SessionError {
    /// The log file could not be prepared; the session does not start
    #[error("log setup failed: {0}")]
    LogSetup(#[from] TailError),

    /// A log subscription named a session that is not the current one
    #[error("stale log session: {0}")]
    StaleSession(SessionId),
}

/// How a session stop concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The runtime observed the stop sentinel and exited within the grace
    Graceful,
    /// The grace period elapsed; the session was finished anyway
    Forced,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The runtime's append-only log file
    pub log_path: PathBuf,
    /// Grace period for a cooperative stop
    pub stop_grace: Duration,
    /// Poll interval of the log watcher
    pub tail_poll_interval: Duration,
}

impl SessionConfig {
    /// Creates a configuration for the given log file
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            stop_grace: DEFAULT_STOP_GRACE,
            tail_poll_interval: Duration::from_millis(25),
        }
    }

    /// Creates a configuration logging to `device.log` under a cache
    /// directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("device.log"))
    }

    /// Overrides the stop grace period
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Overrides the log watcher's poll interval
    pub fn with_tail_poll_interval(mut self, interval: Duration) -> Self {
        self.tail_poll_interval = interval;
        self
    }
}

/// One run of the embedded runtime
pub struct Session {
    compositor: Arc<Compositor>,
    bridge: Arc<InputBridge>,
    tail: LogTail,
    sink: Arc<dyn LogSink + Send + Sync>,
    stop_grace: Duration,
    finished: bool,
}

impl Session {
    /// Starts a fresh session
    ///
    /// Truncates the log file, issues a new session id, and builds empty
    /// driver state. Fails only when the log file cannot be prepared.
    pub fn start(
        config: SessionConfig,
        sink: Arc<dyn LogSink + Send + Sync>,
    ) -> Result<Self, SessionError> {
        let tail = LogTail::with_poll_interval(
            &config.log_path,
            Arc::clone(&sink),
            config.tail_poll_interval,
        )?;
        Ok(Self {
            compositor: Arc::new(Compositor::new()),
            bridge: Arc::new(InputBridge::new()),
            tail,
            sink,
            stop_grace: config.stop_grace,
            finished: false,
        })
    }

    /// This session's id
    pub fn session_id(&self) -> SessionId {
        self.tail.session_id()
    }

    /// The session's compositor
    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    /// The session's input bridge
    pub fn bridge(&self) -> &Arc<InputBridge> {
        &self.bridge
    }

    /// The watched log file
    pub fn log_path(&self) -> &Path {
        self.tail.path()
    }

    /// Builds the driver handed to the runtime thread
    pub fn driver(&self) -> HostDriver {
        HostDriver::new(
            Arc::clone(&self.compositor),
            Arc::clone(&self.bridge),
            Arc::clone(&self.sink),
        )
    }

    /// Subscribes to window lifecycle and draw events from now on
    pub fn subscribe_events(&self) -> Subscriber<DisplayEvent> {
        self.compositor.subscribe_events()
    }

    /// Subscribes to this session's classified log stream
    ///
    /// The id must be the current session's; a stale id is refused (its
    /// stream already ended when that session finished).
    pub fn subscribe_log(&self, session: SessionId) -> Result<Subscriber<LogLine>, SessionError> {
        if session != self.tail.session_id() {
            return Err(SessionError::StaleSession(session));
        }
        Ok(self.tail.subscribe())
    }

    /// Stops the session
    ///
    /// Enqueues the stop sentinel, then waits up to the configured grace for
    /// `runtime_exited` to report true. Either way the session is finished
    /// afterwards: event and log streams end and pending input is discarded,
    /// so the next session starts clean.
    pub fn stop(&mut self, runtime_exited: impl Fn() -> bool) -> StopOutcome {
        if self.finished {
            return StopOutcome::Graceful;
        }
        self.bridge.request_stop();

        let deadline = Instant::now() + self.stop_grace;
        let outcome = loop {
            if runtime_exited() {
                break StopOutcome::Graceful;
            }
            if Instant::now() >= deadline {
                break StopOutcome::Forced;
            }
            thread::sleep(STOP_POLL);
        };
        self.finish();
        outcome
    }

    fn finish(&mut self) {
        self.compositor.close_events();
        self.tail.stop();
        self.bridge.reset();
        self.finished = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}
