//! # Log Tail
//!
//! This crate watches the embedded runtime's append-only log file and turns
//! its growth into classified, fanned-out log lines.
//!
//! ## Philosophy
//!
//! - **The file is the interface**: the runtime only knows how to append
//!   text lines; everything structured happens on the host side
//! - **A session starts empty**: the file is truncated when a tail session
//!   starts, and each session carries a fresh id so hosts can tell runs apart
//! - **Classify, never reject**: unparseable lines are delivered as unknown
//! - **Two destinations**: every line is mirrored to the structured host
//!   logger and published to subscribers, in that order
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A general file-watching library (one file, append-only, by polling)
//! - A log store (delivered lines are not retained here)
//! - A parser of message contents beyond the severity field

mod line;

pub use line::{LineLevel, LogLine};

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use broadcast::{Broadcast, Subscriber};
use display_types::SessionId;
use host_logger::{LogEntry, LogSink};
use thiserror::Error;

/// How often the watcher checks the file for growth
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Log tailer error types
#[derive(Debug, Error)]
pub enum TailError {
    /// Backing file or directory could not be prepared; the session does
    /// not start.
    #[error("failed to set up log file {}: {source}", path.display())]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A running tail session over one append-only log file
///
/// Dropping the tailer stops the watcher thread and ends every subscriber's
/// stream.
pub struct LogTail {
    session: SessionId,
    path: PathBuf,
    channel: Broadcast<LogLine>,
    shutdown: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl LogTail {
    /// Starts a tail session with the default poll interval
    pub fn start(
        path: impl Into<PathBuf>,
        sink: Arc<dyn LogSink + Send + Sync>,
    ) -> Result<Self, TailError> {
        Self::with_poll_interval(path, sink, DEFAULT_POLL_INTERVAL)
    }

    /// Starts a tail session polling at the given interval
    ///
    /// Creates the file's parent directories, truncates the file, and spawns
    /// the watcher thread. Setup failures mean no session.
    pub fn with_poll_interval(
        path: impl Into<PathBuf>,
        sink: Arc<dyn LogSink + Send + Sync>,
        poll_interval: Duration,
    ) -> Result<Self, TailError> {
        let path = path.into();
        let setup = |source| TailError::Setup {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(setup)?;
            }
        }
        // Truncate: a fresh session must not replay a prior run's output.
        File::create(&path).map_err(setup)?;

        let channel = Broadcast::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let watcher = {
            let path = path.clone();
            let channel = channel.clone();
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("log-tail".to_string())
                .spawn(move || watch(&path, &sink, &channel, &shutdown, poll_interval))
                .map_err(setup)?
        };

        Ok(Self {
            session: SessionId::new(),
            path,
            channel,
            shutdown,
            watcher: Some(watcher),
        })
    }

    /// This tail session's id
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// The watched file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribes to classified lines from now on
    pub fn subscribe(&self) -> Subscriber<LogLine> {
        self.channel.subscribe()
    }

    /// Stops the watcher after one final drain of appended bytes
    ///
    /// Ends every subscriber's stream. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

impl Drop for LogTail {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(
    path: &Path,
    sink: &Arc<dyn LogSink + Send + Sync>,
    channel: &Broadcast<LogLine>,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) {
    let mut position = 0u64;
    loop {
        let stopping = shutdown.load(Ordering::Acquire);
        if let Ok(chunk) = read_appended(path, &mut position) {
            if !chunk.is_empty() {
                deliver(&chunk, sink, channel);
            }
        }
        if stopping {
            break;
        }
        thread::sleep(poll_interval);
    }
    channel.close();
}

/// Reads bytes appended since the last call, advancing `position`
fn read_appended(path: &Path, position: &mut u64) -> std::io::Result<Vec<u8>> {
    let len = fs::metadata(path)?.len();
    if len < *position {
        // The file shrank underneath us (external truncation); realign and
        // wait for new appends.
        *position = len;
        return Ok(Vec::new());
    }
    if len == *position {
        return Ok(Vec::new());
    }

    let mut file = OpenOptions::new().read(true).open(path)?;
    file.seek(SeekFrom::Start(*position))?;
    let mut chunk = Vec::with_capacity((len - *position) as usize);
    file.take(len - *position).read_to_end(&mut chunk)?;
    *position += chunk.len() as u64;
    Ok(chunk)
}

/// Splits a chunk into lines and hands each to the sink and the channel
fn deliver(chunk: &[u8], sink: &Arc<dyn LogSink + Send + Sync>, channel: &Broadcast<LogLine>) {
    let text = String::from_utf8_lossy(chunk);
    let mut fragments: Vec<&str> = text.split('\n').collect();
    if fragments.last() == Some(&"") {
        fragments.pop();
    }
    for fragment in fragments {
        let line = LogLine::parse(fragment);
        sink.log(
            LogEntry::new(line.level.host_level(), line.message.clone()).with_source("runtime"),
        );
        channel.publish(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_logger::{LogLevel, MemorySink};
    use std::io::Write;

    fn temp_log() -> PathBuf {
        std::env::temp_dir().join(format!("log_tail_test_{}.log", uuid::Uuid::new_v4()))
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn start_fast(path: &Path, sink: Arc<MemorySink>) -> LogTail {
        LogTail::with_poll_interval(path, sink, Duration::from_millis(2)).unwrap()
    }

    #[test]
    fn test_prior_content_is_truncated_away() {
        let path = temp_log();
        fs::write(&path, "old run L1\nold run L2\n").unwrap();

        let sink = Arc::new(MemorySink::new());
        let tail = start_fast(&path, Arc::clone(&sink));
        let mut lines = tail.subscribe();

        append(&path, "12:00:01 Module I fresh\n");
        let line = lines.next().unwrap();
        assert_eq!(line.message, "12:00:01 Module I fresh");
        assert_eq!(line.level, LineLevel::Info);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);

        drop(tail);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_multiple_lines_in_one_append() {
        let path = temp_log();
        let sink = Arc::new(MemorySink::new());
        let tail = start_fast(&path, Arc::clone(&sink));
        let mut lines = tail.subscribe();

        append(&path, "a b T one\nc d E two\n");
        let first = lines.next().unwrap();
        let second = lines.next().unwrap();
        assert_eq!(first.level, LineLevel::Trace);
        assert_eq!(second.level, LineLevel::Error);
        assert_eq!(second.message, "c d E two");

        drop(tail);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_error_line_mirrors_at_highest_severity() {
        let path = temp_log();
        let sink = Arc::new(MemorySink::new());
        let tail = start_fast(&path, Arc::clone(&sink));
        let mut lines = tail.subscribe();

        append(&path, "12:00:01 Module E something failed\n");
        assert_eq!(lines.next().unwrap().level, LineLevel::Error);
        assert_eq!(sink.entries()[0].level, LogLevel::Error);
        assert_eq!(sink.entries()[0].source.as_deref(), Some("runtime"));

        drop(tail);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_short_line_delivered_as_unknown() {
        let path = temp_log();
        let sink = Arc::new(MemorySink::new());
        let tail = start_fast(&path, Arc::clone(&sink));
        let mut lines = tail.subscribe();

        append(&path, "short line\n");
        assert_eq!(lines.next().unwrap().level, LineLevel::Unknown);

        drop(tail);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_stop_ends_subscriber_stream() {
        let path = temp_log();
        let sink = Arc::new(MemorySink::new());
        let mut tail = start_fast(&path, sink);
        let mut lines = tail.subscribe();

        tail.stop();
        assert_eq!(lines.next(), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_sessions_get_fresh_ids() {
        let path = temp_log();
        let sink = Arc::new(MemorySink::new());
        let first = start_fast(&path, Arc::clone(&sink));
        let first_id = first.session_id();
        drop(first);

        let second = start_fast(&path, sink);
        assert_ne!(second.session_id(), first_id);

        drop(second);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_setup_failure_means_no_session() {
        // A directory path cannot be truncated as a file.
        let dir = std::env::temp_dir();
        let sink: Arc<MemorySink> = Arc::new(MemorySink::new());
        let result = LogTail::start(&dir, sink);
        assert!(matches!(result, Err(TailError::Setup { .. })));
    }

    #[test]
    fn test_parent_directories_are_created() {
        let path = std::env::temp_dir()
            .join(format!("log_tail_dir_{}", uuid::Uuid::new_v4()))
            .join("nested")
            .join("device.log");
        let sink = Arc::new(MemorySink::new());
        let tail = start_fast(&path, sink);
        assert!(path.exists());

        drop(tail);
        let _ = fs::remove_file(&path);
    }
}
