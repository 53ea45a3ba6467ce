//! Writer Pool
//!
//! Hands out disjoint [`ArcWriter`]s to producer threads. A writer is never
//! shared: concurrency comes from giving each thread its own.
//!
//! ## Borrow / Return
//! ```text
//!  borrow ──► idle writer?  ──yes──► hand it out (active += 1)
//!               │no
//!               ▼
//!            active < max? ──yes──► new writer (shared serials, dirs)
//!               │no
//!               ▼
//!            wait on condvar until max_wait ──timeout──► PoolExhausted
//!
//!  drop(PooledWriter) ──► rotate if full ──► back to idle, notify one
//! ```
//!
//! ## Concurrency
//! - `state`: parking_lot Mutex guarding the idle list and counters
//! - `available`: Condvar signalled whenever a writer comes back

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::config::{PoolConfig, WriterSettings};
use crate::error::{ArcError, Result};
use crate::writer::{ArcWriter, FileNamer};

struct PoolState {
    idle: Vec<ArcWriter>,
    active: usize,
    closed: bool,

    /// Containers finished by writers that have come back
    finished: Vec<PathBuf>,
}

struct PoolShared {
    settings: Arc<WriterSettings>,
    namer: Arc<FileNamer>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PoolShared {
    fn placeholder(&self) -> ArcWriter {
        ArcWriter::with_namer(self.settings.clone(), self.namer.clone())
    }

    fn describe(&self, state: &PoolState) -> String {
        format!(
            "active {} of max {}, idle {}{}",
            state.active,
            self.config.max_active,
            state.idle.len(),
            if state.closed { ", closed" } else { "" }
        )
    }
}

/// Bounded pool of container writers
#[derive(Clone)]
pub struct WriterPool {
    shared: Arc<PoolShared>,
}

impl WriterPool {
    pub fn new(settings: WriterSettings, config: PoolConfig) -> Result<Self> {
        if config.max_active == 0 {
            return Err(ArcError::Config("pool max_active must be at least 1".to_string()));
        }
        if settings.dirs.is_empty() {
            return Err(ArcError::Config("pool needs at least one output directory".to_string()));
        }
        Ok(Self {
            shared: Arc::new(PoolShared {
                settings: Arc::new(settings),
                namer: Arc::new(FileNamer::new()),
                config,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    active: 0,
                    closed: false,
                    finished: Vec::new(),
                }),
                available: Condvar::new(),
            }),
        })
    }

    /// Borrow a writer, blocking up to the configured max wait.
    pub fn borrow(&self) -> Result<PooledWriter> {
        let shared = &self.shared;
        let started = Instant::now();
        // None waits indefinitely
        let deadline = started.checked_add(shared.config.max_wait);
        let mut state = shared.state.lock();
        loop {
            if state.closed {
                return Err(ArcError::Config("writer pool is closed".to_string()));
            }
            if let Some(writer) = state.idle.pop() {
                state.active += 1;
                tracing::debug!(pool = %shared.describe(&state), "Borrowed idle writer");
                return Ok(self.guard(writer));
            }
            if state.active < shared.config.max_active {
                state.active += 1;
                tracing::debug!(pool = %shared.describe(&state), "Created writer");
                return Ok(self.guard(shared.placeholder()));
            }
            let timed_out = match deadline {
                Some(deadline) => shared.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    shared.available.wait(&mut state);
                    false
                }
            };
            if timed_out
                && state.idle.is_empty()
                && state.active >= shared.config.max_active
            {
                let waited_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(pool = %shared.describe(&state), waited_ms, "Writer pool exhausted");
                return Err(ArcError::PoolExhausted {
                    waited_ms,
                    active: state.active,
                    max_active: shared.config.max_active,
                });
            }
        }
    }

    fn guard(&self, writer: ArcWriter) -> PooledWriter {
        PooledWriter {
            writer,
            shared: self.shared.clone(),
            discard: false,
        }
    }

    /// Close the borrowed writer, mark its file `.invalid` and drop it from
    /// the pool. Returns the renamed file, if one was open.
    pub fn invalidate(&self, mut writer: PooledWriter) -> Result<Option<PathBuf>> {
        writer.discard = true;
        writer.writer.invalidate()
    }

    /// Close every idle writer and refuse further borrows. Writers still
    /// out are closed as they come back.
    pub fn close(&self) -> Result<()> {
        let idle = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        let mut first_error = None;
        let mut finished = Vec::new();
        for mut writer in idle {
            if let Err(e) = writer.close() {
                tracing::error!(error = %e, "Failed to close pooled writer");
                first_error.get_or_insert(e);
            }
            finished.extend(writer.drain_finished());
        }
        let mut state = self.shared.state.lock();
        state.finished.extend(finished);
        tracing::info!(pool = %self.shared.describe(&state), "Closed writer pool");
        drop(state);
        self.shared.available.notify_all();
        first_error.map_or(Ok(()), Err)
    }

    pub fn num_active(&self) -> usize {
        self.shared.state.lock().active
    }

    pub fn num_idle(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Human-readable pool counters, as logged
    pub fn pool_state(&self) -> String {
        let state = self.shared.state.lock();
        self.shared.describe(&state)
    }

    /// Containers finished by writers that have been returned or closed
    pub fn finished_files(&self) -> Vec<PathBuf> {
        self.shared.state.lock().finished.clone()
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.shared.settings
    }
}

impl std::fmt::Debug for WriterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterPool")
            .field("state", &self.pool_state())
            .finish()
    }
}

/// A writer on loan from a [`WriterPool`]; returned on drop
pub struct PooledWriter {
    writer: ArcWriter,
    shared: Arc<PoolShared>,

    /// Do not return this writer to the idle list
    discard: bool,
}

impl Deref for PooledWriter {
    type Target = ArcWriter;

    fn deref(&self) -> &ArcWriter {
        &self.writer
    }
}

impl DerefMut for PooledWriter {
    fn deref_mut(&mut self) -> &mut ArcWriter {
        &mut self.writer
    }
}

impl Drop for PooledWriter {
    fn drop(&mut self) {
        let mut writer = std::mem::replace(&mut self.writer, self.shared.placeholder());
        if !self.discard {
            if let Err(e) = writer.rotate_if_full() {
                tracing::error!(error = %e, "Rotation on return failed, dropping writer");
                self.discard = true;
            }
        }
        let finished = writer.drain_finished();

        let mut state = self.shared.state.lock();
        state.active -= 1;
        state.finished.extend(finished);
        let keep = !self.discard && !state.closed;
        tracing::debug!(pool = %self.shared.describe(&state), keep, "Writer returned");
        if keep {
            state.idle.push(writer);
            drop(state);
        } else {
            drop(state);
            let path = writer.close();
            let mut state = self.shared.state.lock();
            match path {
                Ok(Some(path)) => state.finished.push(path),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Failed to close discarded writer"),
            }
        }
        self.shared.available.notify_one();
    }
}
