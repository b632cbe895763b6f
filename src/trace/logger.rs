use std::{fs::OpenOptions, io::Write, sync::Mutex};

use tracing::warn;

use crate::trace::trace::TraceEvent;

enum TraceSink {
    Disabled,
    File(Mutex<std::fs::File>),
    Memory(Mutex<Vec<TraceEvent>>),
}

/// JSONL audit trail of collection passes, fill actions, vetoes, submit
/// decisions and workflow transitions.
pub struct TraceLogger {
    sink: TraceSink,
}

impl TraceLogger {
    pub fn new(path: &str) -> Self {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path);

        match file {
            Ok(f) => Self {
                sink: TraceSink::File(Mutex::new(f)),
            },
            Err(e) => {
                warn!("could not open trace file '{}': {}", path, e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            sink: TraceSink::Disabled,
        }
    }

    /// Keeps events in memory, readable through `events()`.
    pub fn in_memory() -> Self {
        Self {
            sink: TraceSink::Memory(Mutex::new(Vec::new())),
        }
    }

    pub fn from_path(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::new(p),
            None => Self::disabled(),
        }
    }

    pub fn log(&self, event: TraceEvent) {
        let file_mutex = match &self.sink {
            TraceSink::Disabled => return,
            TraceSink::Memory(events) => {
                match events.lock() {
                    Ok(mut events) => events.push(event),
                    Err(e) => warn!("trace buffer lock poisoned: {}", e),
                }
                return;
            }
            TraceSink::File(f) => f,
        };

        let json = match serde_json::to_string(&event) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize trace event: {}", e);
                return;
            }
        };

        let mut file = match file_mutex.lock() {
            Ok(f) => f,
            Err(e) => {
                warn!("trace logger lock poisoned: {}", e);
                return;
            }
        };

        if let Err(e) = writeln!(file, "{}", json) {
            warn!("failed to write trace event: {}", e);
        }
    }

    /// Events captured by an in-memory logger. Empty for other sinks.
    pub fn events(&self) -> Vec<TraceEvent> {
        match &self.sink {
            TraceSink::Memory(events) => events.lock().map(|e| e.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl Default for TraceLogger {
    fn default() -> Self {
        Self::disabled()
    }
}
