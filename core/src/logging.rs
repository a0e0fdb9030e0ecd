/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Event-log setup. The run writes a single append-only log file, hard-capped at
//! [`crate::constants::MAX_LOG_LINES`] lines, with further events silently dropped past
//! that point - not an error, not a truncation notice. This module provides
//! [`LineCappedWriter`], a `std::io::Write` wrapper enforcing that cap, and [`init`],
//! which wires it into a `tracing_subscriber` registry the same way the rest of this
//! workspace wires up its logging.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use crate::constants::MAX_LOG_LINES;
use crate::error::SetupError;

/// Wraps a `Write` and counts newline-terminated lines, refusing to write any byte
/// past the [`MAX_LOG_LINES`]th line. A write that straddles the cap is accepted in
/// full (the cap is "no new line starts after this point", not a mid-write byte
/// limit) and every write still reports `Ok` with the full length, matching `write!`
/// macro expectations - the caller is never told their log line failed.
pub struct LineCappedWriter<W: Write> {
    inner: W,
    lines_written: u64,
    cap: u64,
}

impl<W: Write> LineCappedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            lines_written: 0,
            cap: MAX_LOG_LINES,
        }
    }

    #[must_use]
    pub fn lines_written(&self) -> u64 { self.lines_written }

    #[must_use]
    pub fn is_capped(&self) -> bool { self.lines_written >= self.cap }
}

impl<W: Write> Write for LineCappedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.is_capped() {
            return Ok(buf.len());
        }
        self.inner.write_all(buf)?;
        self.lines_written += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

/// A shared, `Clone`-able handle to a [`LineCappedWriter`] over a [`File`], suitable
/// for [`tracing_subscriber::fmt::Layer::with_writer`].
#[derive(Clone)]
pub struct EventLog {
    writer: Arc<Mutex<LineCappedWriter<File>>>,
}

impl EventLog {
    /// Opens (creating if necessary, truncating if present) the log file at `path`.
    pub fn open(path: &Path) -> Result<Self, SetupError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| SetupError::LogOpen {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            writer: Arc::new(Mutex::new(LineCappedWriter::new(file))),
        })
    }

    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.writer.lock().expect("event log mutex poisoned").lines_written()
    }
}

impl<'a> MakeWriter<'a> for EventLog {
    type Writer = EventLogHandle;

    fn make_writer(&'a self) -> Self::Writer {
        EventLogHandle {
            writer: Arc::clone(&self.writer),
        }
    }
}

/// A single borrow of the shared log file handed out by `tracing_subscriber` for the
/// duration of one event write.
pub struct EventLogHandle {
    writer: Arc<Mutex<LineCappedWriter<File>>>,
}

impl Write for EventLogHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.lock().expect("event log mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.lock().expect("event log mutex poisoned").flush()
    }
}

/// Installs a `tracing_subscriber` registry that writes plain, unadorned lines (no
/// ANSI color, no target/level prefix noise) to `log` - the event log is meant to be
/// read as a protocol trace of the run, not a developer debug log. When `verbose` is
/// false, per-request events are filtered out at the
/// `tracing::Level::DEBUG` threshold; terminations, snapshots, and deadlock events are
/// always logged at `INFO` or above.
pub fn init(log: EventLog, verbose: bool) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    let fmt_layer = fmt::layer()
        .with_writer(log)
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .without_time();

    let _ = tracing_subscriber::registry().with(fmt_layer).with(filter).try_init();
}
