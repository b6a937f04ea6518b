//! Forwards `log` records to a log device.
//!
//! A process-wide [`Log`] implementation formats each record and queues it
//! without waiting. The logger task drains the queue and writes one record per
//! device write.

use super::write_frame;
use crate::error::TaskError;
use crate::hal::CharDevice;
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, OnceLock, PoisonError};
use tokio::sync::mpsc;

/// Records held while the log device is busy. Further records are dropped.
pub const LOG_QUEUE_LEN: usize = 32;

/// Create a sink and the queue of formatted records it feeds.
pub fn channel(level: LevelFilter) -> (LogSink, LogRecords) {
    let (tx, rx) = mpsc::channel(LOG_QUEUE_LEN);
    (LogSink { tx, level }, LogRecords { rx })
}

/// Producing end, called from any task through the `log` macros.
#[derive(Debug)]
pub struct LogSink {
    tx: mpsc::Sender<String>,
    level: LevelFilter,
}

impl LogSink {
    pub fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    /// Format and queue `record`. Never waits, a full queue drops the record.
    pub fn forward(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("[{}] {}: {}\n", record.level(), record.target(), record.args());
        let _ = self.tx.try_send(line);
    }
}

/// Consuming end, owned by the logger task.
#[derive(Debug)]
pub struct LogRecords {
    rx: mpsc::Receiver<String>,
}

struct Forwarder {
    sink: Mutex<Option<LogSink>>,
}

impl Log for Forwarder {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.sink.lock() {
            Ok(sink) => sink.as_ref().map_or(false, |sink| sink.enabled(metadata)),
            Err(_) => false,
        }
    }

    fn log(&self, record: &Record) {
        if let Ok(sink) = self.sink.lock() {
            if let Some(sink) = sink.as_ref() {
                sink.forward(record);
            }
        }
    }

    fn flush(&self) {}
}

static FORWARDER: Forwarder = Forwarder {
    sink: Mutex::new(None),
};

/// Route every `log` record into `sink`, replacing the sink of a previous install.
///
/// Returns `false` if the application already installed a different logger.
pub fn install(sink: LogSink) -> bool {
    static INSTALLED: OnceLock<bool> = OnceLock::new();
    if !*INSTALLED.get_or_init(|| log::set_logger(&FORWARDER).is_ok()) {
        return false;
    }

    let level = sink.level;
    *FORWARDER.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    log::set_max_level(level);
    true
}

/// Write queued records to `device` until every sink is gone.
pub async fn run<L>(mut device: L, mut records: LogRecords) -> Result<(), TaskError>
where
    L: CharDevice,
{
    let mut out = Vec::new();
    while let Some(line) = records.rx.recv().await {
        out.clear();
        out.extend_from_slice(line.as_bytes());

        // Reporting a failed write would queue another record for this device
        let _ = write_frame(&mut device, &mut out).await;
    }
    Ok(())
}
