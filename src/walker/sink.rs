//! Serialized reporting of ingestion events
//!
//! Workers never print. They hand [`IngestEvent`]s to an [`EventSink`]; the
//! production sink is a [`LogHandle`] feeding a single consumer thread that
//! owns the console.
//!
//! Shutdown is close-then-join: the consumer drains the channel and exits
//! once every `LogHandle` clone has been dropped, and
//! [`LogConsumer::finish`] joins it. No message sent before the last handle
//! is dropped can be lost.

use crate::progress::ProgressReporter;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Channel capacity between workers and the consumer
const EVENT_CHANNEL_SIZE: usize = 1024;

/// One user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Info(String),
    Error(String),
}

/// Destination for ingestion events
pub trait EventSink: Send + Sync {
    fn report(&self, event: IngestEvent);

    fn info(&self, message: String) {
        self.report(IngestEvent::Info(message));
    }

    fn error(&self, message: String) {
        self.report(IngestEvent::Error(message));
    }
}

/// Console behaviour of the consumer
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Print `LOG:` lines
    pub verbose: bool,
    /// Drive a spinner with running counts
    pub progress: bool,
}

/// Counts of events the consumer handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    pub infos: u64,
    pub errors: u64,
}

/// Sending side of the consumer channel
#[derive(Clone)]
pub struct LogHandle {
    sender: Sender<IngestEvent>,
}

impl EventSink for LogHandle {
    fn report(&self, event: IngestEvent) {
        // Only fails if the consumer thread is gone
        if let Err(e) = self.sender.send(event) {
            warn!("Log consumer unavailable, dropped: {:?}", e.into_inner());
        }
    }
}

/// Destination for one stream of console lines
pub type Output = Box<dyn Write + Send>;

/// The thread that owns console output for a run
pub struct LogConsumer {
    handle: Option<JoinHandle<LogStats>>,
}

impl LogConsumer {
    /// Start the consumer on stdout/stderr and return it with the first handle
    pub fn spawn(options: LogOptions) -> io::Result<(Self, LogHandle)> {
        Self::spawn_with_writers(options, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Start the consumer with `LOG:` lines going to `out` and `ERR:` lines to `err`
    pub fn spawn_with_writers(
        options: LogOptions,
        out: Output,
        err: Output,
    ) -> io::Result<(Self, LogHandle)> {
        let (sender, receiver) = bounded(EVENT_CHANNEL_SIZE);

        let handle = thread::Builder::new()
            .name("log-consumer".into())
            .spawn(move || consume(receiver, options, out, err))?;

        Ok((
            Self {
                handle: Some(handle),
            },
            LogHandle { sender },
        ))
    }

    /// Wait for every handle to be dropped and the channel to drain
    pub fn finish(mut self) -> LogStats {
        let Some(handle) = self.handle.take() else {
            return LogStats::default();
        };

        match handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                warn!("Log consumer thread panicked");
                LogStats::default()
            }
        }
    }
}

fn consume(
    receiver: Receiver<IngestEvent>,
    options: LogOptions,
    mut out: Output,
    mut err: Output,
) -> LogStats {
    let reporter = options.progress.then(ProgressReporter::new);
    let mut stats = LogStats::default();

    // Ends when the last sender is dropped
    for event in receiver {
        match event {
            IngestEvent::Info(message) => {
                stats.infos += 1;
                if options.verbose {
                    emit(reporter.as_ref(), out.as_mut(), &format!("LOG: {message}"));
                }
            }
            IngestEvent::Error(message) => {
                stats.errors += 1;
                emit(reporter.as_ref(), err.as_mut(), &format!("ERR: {message}"));
            }
        }

        if let Some(r) = &reporter {
            r.update(stats.infos, stats.errors);
        }
    }

    if let Some(r) = reporter {
        r.finish_and_clear();
    }
    debug!(infos = stats.infos, errors = stats.errors, "Log consumer finished");
    stats
}

fn emit(reporter: Option<&ProgressReporter>, writer: &mut dyn Write, line: &str) {
    let result = match reporter {
        Some(r) => r.suspend(|| write_line(writer, line)),
        None => write_line(writer, line),
    };
    if let Err(e) = result {
        debug!(error = %e, "Console write failed");
    }
}

fn write_line(writer: &mut dyn Write, line: &str) -> io::Result<()> {
    writeln!(writer, "{line}")?;
    writer.flush()
}
