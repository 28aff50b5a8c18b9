//! Log capture module - forwards log records to the TUI's log pane.
//!
//! The TUI owns the terminal, so nothing may print to stdout while it runs.
//! Every record is turned into a `LogEntry` and sent over a channel instead.

use std::sync::mpsc::Sender;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Custom logger that sends records to the TUI.
pub struct CaptureLogger {
    tx: Sender<LogEntry>,
    max_level: LevelFilter,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = LogEntry {
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        };
        // The TUI may already be gone during shutdown.
        let _ = self.tx.send(entry);
    }

    fn flush(&self) {}
}

/// Install the capture logger. Returns false if a logger was already set.
pub fn init(tx: Sender<LogEntry>, max_level: LevelFilter) -> bool {
    let logger = CaptureLogger { tx, max_level };
    match log::set_boxed_logger(Box::new(logger)) {
        Ok(()) => {
            log::set_max_level(max_level);
            true
        }
        Err(_) => false,
    }
}
