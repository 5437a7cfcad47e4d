//! Output capture for spawned processes.
//!
//! Each output stream of a child gets its own [`LogWriter`] and a tokio task
//! that drains the stream into it line by line. A single [`FlushScheduler`]
//! per cluster flushes every live writer on a fixed interval, so output shows
//! up on disk within one interval without a timer per stream.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Buffered log file fed by exactly one stream.
///
/// The handle is `None` once closed; the mutex keeps a concurrent `flush()`
/// from racing the close.
#[derive(Debug)]
pub struct LogWriter {
    path: PathBuf,
    out: Mutex<Option<BufWriter<File>>>,
}

impl LogWriter {
    /// Open (or create) `path` for appending.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Arc<Self>> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Arc::new(Self {
            path,
            out: Mutex::new(Some(BufWriter::new(file))),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` followed by a newline.
    ///
    /// Called from capture tasks on runtime threads. The line normally lands
    /// in the in-memory buffer; only a full buffer writes through to the file
    /// here, which is bounded by the buffer size. Periodic flushing happens
    /// on the blocking pool.
    pub fn append_line(&self, line: &[u8]) -> io::Result<()> {
        let mut out = self.out.lock();
        let writer = out
            .as_mut()
            .ok_or_else(|| io::Error::other("log writer is closed"))?;
        writer.write_all(line)?;
        writer.write_all(b"\n")
    }

    /// Push buffered output to the file. No-op after close.
    pub fn flush(&self) -> io::Result<()> {
        match self.out.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// Flush and release the file. Only the first call does anything.
    pub fn close(&self) -> io::Result<()> {
        let writer = self.out.lock().take();
        match writer {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.out.lock().is_none()
    }
}

/// Drain `stream` into `writer` until end-of-stream, then close both.
///
/// Lines are read as bytes so non-UTF-8 output is kept. A trailing `\r\n` or
/// `\n` is normalized to `\n`. I/O errors end the task and are only logged.
pub fn spawn_capture<R>(stream: R, writer: Arc<LogWriter>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if line.last() == Some(&b'\n') {
                        line.pop();
                        if line.last() == Some(&b'\r') {
                            line.pop();
                        }
                    }
                    if let Err(e) = writer.append_line(&line) {
                        tracing::warn!(log = %writer.path().display(), error = %e, "Failed to write log line");
                        break;
                    }
                },
                Err(e) => {
                    tracing::warn!(log = %writer.path().display(), error = %e, "Failed to read process output");
                    break;
                },
            }
        }

        if let Err(e) = writer.close() {
            tracing::warn!(log = %writer.path().display(), error = %e, "Failed to close log file");
        }
        drop(reader);
    })
}

/// Append-only set of writers owned by the orchestrator.
#[derive(Debug, Default)]
pub struct LogRegistry {
    writers: Mutex<Vec<Arc<LogWriter>>>,
}

impl LogRegistry {
    pub fn register(&self, writer: Arc<LogWriter>) {
        self.writers.lock().push(writer);
    }

    /// Take every registered writer, leaving the registry empty.
    pub fn drain(&self) -> Vec<Arc<LogWriter>> {
        std::mem::take(&mut *self.writers.lock())
    }

    pub fn len(&self) -> usize {
        self.writers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One periodic task flushing every registered writer.
///
/// Writers are held weakly; a writer nobody else references is pruned on the
/// next tick. The task is aborted when the scheduler is dropped.
#[derive(Debug)]
pub struct FlushScheduler {
    sinks: Arc<Mutex<Vec<Weak<LogWriter>>>>,
    task: JoinHandle<()>,
}

impl FlushScheduler {
    /// Start the flush task on the current tokio runtime.
    pub fn start(interval: Duration) -> Self {
        let sinks: Arc<Mutex<Vec<Weak<LogWriter>>>> = Arc::default();
        let task_sinks = Arc::clone(&sinks);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let sinks = Arc::clone(&task_sinks);
                if let Err(e) = tokio::task::spawn_blocking(move || flush_all(&sinks)).await {
                    tracing::warn!(error = %e, "Periodic log flush task failed");
                }
            }
        });

        Self { sinks, task }
    }

    pub fn register(&self, writer: &Arc<LogWriter>) {
        self.sinks.lock().push(Arc::downgrade(writer));
    }

    /// Number of registered writers still alive.
    pub fn live(&self) -> usize {
        self.sinks
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn flush_all(sinks: &Mutex<Vec<Weak<LogWriter>>>) {
    let live: Vec<Arc<LogWriter>> = {
        let mut sinks = sinks.lock();
        sinks.retain(|w| w.strong_count() > 0);
        sinks.iter().filter_map(Weak::upgrade).collect()
    };

    for writer in live {
        if let Err(e) = writer.flush() {
            tracing::warn!(log = %writer.path().display(), error = %e, "Periodic log flush failed");
        }
    }
}
