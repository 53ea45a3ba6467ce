//! Batch indexing
//!
//! Indexes many containers on a small pool of scoped worker threads fed
//! through a channel. A failed container is logged and left with its
//! `.open` marker; the rest of the batch carries on.

use std::path::{Path, PathBuf};

use crossbeam::channel;

use crate::config::IndexOptions;

use super::wcdx::{index_container, IndexOutcome};

/// Upper bound on workers when the thread count is left to default.
const DEFAULT_MAX_WORKERS: usize = 4;

/// Per-container results of a batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub indexed: Vec<IndexOutcome>,

    /// Containers that failed, with the error rendered
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Index every container, continuing past failures.
pub fn index_all<P: AsRef<Path> + Sync>(containers: &[P], options: &IndexOptions) -> BatchSummary {
    let workers = match options.threads {
        0 => containers.len().clamp(1, DEFAULT_MAX_WORKERS),
        n => n,
    };
    let (job_tx, job_rx) = channel::unbounded::<&Path>();
    let (done_tx, done_rx) = channel::unbounded();
    for container in containers {
        let _ = job_tx.send(container.as_ref());
    }
    drop(job_tx);

    let scoped = crossbeam::scope(|scope| {
        for _ in 0..workers {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            scope.spawn(move |_| {
                for container in jobs.iter() {
                    let result = index_container(container, options);
                    let _ = done.send((container.to_path_buf(), result));
                }
            });
        }
    });
    drop(done_tx);
    if scoped.is_err() {
        tracing::error!("An indexing worker panicked");
    }

    let mut summary = BatchSummary::default();
    for (container, result) in done_rx.iter() {
        match result {
            Ok(outcome) => summary.indexed.push(outcome),
            Err(e) => summary.failed.push((container, e.to_string())),
        }
    }
    tracing::info!(
        indexed = summary.indexed.len(),
        failed = summary.failed.len(),
        "Batch indexing finished"
    );
    summary
}
