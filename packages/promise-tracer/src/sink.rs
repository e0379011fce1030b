//! Destinations for assembled trace events.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::TracerError;
use crate::events::TraceEvent;

/// Durable storage for trace events, fed one record at a time.
pub trait EventSink {
    fn persist(&mut self, event: &TraceEvent) -> Result<(), TracerError>;

    fn flush(&mut self) -> Result<(), TracerError> {
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn persist(&mut self, event: &TraceEvent) -> Result<(), TracerError> {
        (**self).persist(event)
    }

    fn flush(&mut self) -> Result<(), TracerError> {
        (**self).flush()
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Vec<TraceEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for MemorySink {
    fn persist(&mut self, event: &TraceEvent) -> Result<(), TracerError> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn persist(&mut self, _event: &TraceEvent) -> Result<(), TracerError> {
        Ok(())
    }
}

/// Writes one JSON object per line to a file.
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl JsonLinesSink {
    /// Open `path`, creating parent directories. Existing content is kept
    /// unless `truncate` is set.
    pub fn create(path: impl AsRef<Path>, truncate: bool) -> Result<Self, TracerError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path)?;
        log::debug!("writing trace events to {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl EventSink for JsonLinesSink {
    fn persist(&mut self, event: &TraceEvent) -> Result<(), TracerError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TracerError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            log::warn!("failed to flush {}: {}", self.path.display(), err);
        }
    }
}
