//! Tagging many lines, optionally across worker threads.
//!
//! With a concurrency of 1 (or a single line) every line is profiled on the
//! calling thread against one index. Otherwise lines are queued as
//! `(sequence_index, line)` jobs on a channel drained by a fixed pool of
//! named worker threads. Each worker opens its own index from the shared
//! [`IndexSpec`]; results come back on a second channel and are sorted by
//! sequence index before returning, so completion order never leaks out.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{ElevationError, Result};
use crate::geometry::{Line, MultiLine};
use crate::profile::{profile, ElevationStats, IndexSpec};

/// Warn when available memory covers less than this many copies of the
/// per-worker raster footprint.
const MEMORY_HEADROOM: f64 = 2.0;

/// Progress callback, called with the number of lines finished so far.
pub type ProgressFn = dyn Fn(usize) + Send + Sync;

/// Drives a batch of lines through the profiler.
pub struct BatchTagger {
    spec: IndexSpec,
    concurrency: usize,
    progress: Option<Box<ProgressFn>>,
}

impl BatchTagger {
    /// A tagger for the source described by `spec`. A concurrency of 0 is
    /// treated as 1.
    pub fn new(spec: IndexSpec, concurrency: usize) -> Self {
        Self {
            spec,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    /// Report progress through `f`.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Profile every line, returning one record per line in input order.
    pub fn tag(&self, lines: &MultiLine) -> Result<Vec<ElevationStats>> {
        let workers = self.concurrency.min(lines.len());
        tracing::info!(lines = lines.len(), workers, "Tagging lines");

        if workers <= 1 {
            self.tag_sequential(lines)
        } else {
            self.tag_parallel(lines, workers)
        }
    }

    fn tag_sequential(&self, lines: &MultiLine) -> Result<Vec<ElevationStats>> {
        let index = self.spec.open()?;
        let mut results = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            results.push(profile(line, &index, i));
            self.report(i + 1);
        }
        Ok(results)
    }

    fn tag_parallel(&self, lines: &MultiLine, workers: usize) -> Result<Vec<ElevationStats>> {
        if self.spec.is_raster() {
            warn_if_low_memory(self.spec.path(), workers);
        }

        let total = lines.len();
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &Line)>();
        for job in lines.iter().enumerate() {
            // The receiver is alive until the scope below ends
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<Result<ElevationStats>>();
        let cancel = AtomicBool::new(false);

        let mut results = Vec::with_capacity(total);
        let mut failure: Option<ElevationError> = None;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let jobs = job_rx.clone();
                let out = result_tx.clone();
                let spec = &self.spec;
                let cancel = &cancel;
                let spawned = thread::Builder::new()
                    .name(format!("elevtag-worker-{}", worker))
                    .spawn_scoped(scope, move || run_worker(worker, spec, jobs, out, cancel));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        failure = Some(ElevationError::WorkerFailed(format!(
                            "failed to spawn worker {}: {}",
                            worker, e
                        )));
                        break;
                    }
                }
            }
            // Only workers hold senders now, so recv fails once they are all gone
            drop(result_tx);

            if failure.is_none() {
                while results.len() < total {
                    match result_rx.recv() {
                        Ok(Ok(stats)) => {
                            results.push(stats);
                            self.report(results.len());
                        }
                        Ok(Err(e)) => {
                            failure = Some(e);
                            break;
                        }
                        Err(_) => break,
                    }
                }
            }

            cancel.store(true, Ordering::Relaxed);
            for handle in handles {
                if handle.join().is_err() && failure.is_none() {
                    failure = Some(ElevationError::WorkerFailed("worker panicked".to_string()));
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        if results.len() != total {
            return Err(ElevationError::WorkerFailed(format!(
                "received {} of {} results",
                results.len(),
                total
            )));
        }

        results.sort_by_key(|s| s.sequence_index);
        Ok(results)
    }

    fn report(&self, done: usize) {
        if let Some(progress) = &self.progress {
            progress(done);
        }
    }
}

fn run_worker(
    worker: usize,
    spec: &IndexSpec,
    jobs: Receiver<(usize, &Line)>,
    out: Sender<Result<ElevationStats>>,
    cancel: &AtomicBool,
) {
    let index = match spec.open() {
        Ok(index) => index,
        Err(e) => {
            tracing::debug!(worker, error = %e, "Worker could not open index");
            let _ = out.send(Err(e));
            return;
        }
    };

    let mut done = 0usize;
    while !cancel.load(Ordering::Relaxed) {
        let Ok((i, line)) = jobs.recv() else {
            break;
        };
        if out.send(Ok(profile(line, &index, i))).is_err() {
            break;
        }
        done += 1;
    }
    tracing::debug!(worker, done, "Worker finished");
}

/// Bytes of memory available for new allocations, where the platform
/// reports it.
#[cfg(target_os = "linux")]
pub fn available_memory() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    content.lines().find_map(|line| {
        // Format: "MemAvailable:    8123456 kB"
        let rest = line.strip_prefix("MemAvailable:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

#[cfg(not(target_os = "linux"))]
pub fn available_memory() -> Option<u64> {
    None
}

/// `true` when `available` bytes hold fewer than two copies of
/// `file_size` per worker.
pub fn is_memory_tight(available: u64, file_size: u64, workers: usize) -> bool {
    let needed = file_size as f64 * workers as f64;
    needed > 0.0 && (available as f64 / needed) < MEMORY_HEADROOM
}

fn warn_if_low_memory(path: &Path, workers: usize) {
    let Ok(meta) = std::fs::metadata(path) else {
        return;
    };
    let Some(available) = available_memory() else {
        return;
    };
    if is_memory_tight(available, meta.len(), workers) {
        tracing::warn!(
            path = %path.display(),
            file_bytes = meta.len(),
            workers,
            available_bytes = available,
            "Each worker loads its own copy of the raster; memory may run short"
        );
    }
}
