//! Concurrent, chunked batch processing.
//!
//! [`BatchPipeline::run`] splits an ordered work list into fixed-size chunks,
//! runs a transform on each chunk with at most `workers` chunks in flight, and
//! reassembles the results in chunk order. Each finished chunk lands in the
//! slot matching its ordinal, so the output order never depends on which
//! worker finished first.
//!
//! Includes:
//! - `export`: kind → CSV file.
//! - `import`: CSV file → kind.

mod export;
mod import;

pub use export::*;
pub use import::*;

use crate::error::{AppError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A contiguous slice of the work list and its position in the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    pub ordinal: usize,
    pub items: Vec<T>,
}

/// Splits `items` into chunks of at most `chunk_size`, preserving order.
///
/// Chunk `i` covers positions `[i * chunk_size, min((i + 1) * chunk_size, len))`.
/// A `chunk_size` of zero is treated as one.
pub fn partition<T>(items: Vec<T>, chunk_size: usize) -> Vec<Chunk<T>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut rest = items.into_iter().peekable();
    while rest.peek().is_some() {
        let items: Vec<T> = rest.by_ref().take(chunk_size).collect();
        chunks.push(Chunk {
            ordinal: chunks.len(),
            items,
        });
    }
    chunks
}

/// Chunk size and worker bound for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPipeline {
    chunk_size: usize,
    workers: usize,
}

impl BatchPipeline {
    /// Both values are clamped to at least one.
    pub fn new(chunk_size: usize, workers: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            workers: workers.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Applies `transform` to every chunk of `items` and returns the
    /// concatenated results in original chunk order.
    ///
    /// `on_progress(completed, total)` is called after each chunk finishes.
    ///
    /// # Errors
    ///
    /// The first failing chunk fails the whole run: outstanding chunks are
    /// aborted and results already produced are discarded. A panicking worker
    /// surfaces as `AppError::Task`.
    pub async fn run<T, R, F, Fut, P>(
        &self,
        items: Vec<T>,
        transform: F,
        mut on_progress: P,
    ) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
        P: FnMut(usize, usize),
    {
        let chunks = partition(items, self.chunk_size);
        let total = chunks.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        debug!(
            "Dispatching {} chunk(s) of up to {} item(s) to {} worker(s)",
            total, self.chunk_size, self.workers
        );

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut join_set = JoinSet::new();
        for chunk in chunks {
            let permits = Arc::clone(&permits);
            let work = transform(chunk.items);
            let ordinal = chunk.ordinal;
            join_set.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => work.await,
                    Err(e) => Err(AppError::Task(e.to_string())),
                };
                (ordinal, result)
            });
        }

        // One slot per chunk, written once by ordinal.
        let mut slots: Vec<Option<Vec<R>>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        while let Some(joined) = join_set.join_next().await {
            let (ordinal, result) = joined?;
            match result {
                Ok(rows) => {
                    slots[ordinal] = Some(rows);
                    completed += 1;
                    debug!("Chunk {} finished ({}/{})", ordinal, completed, total);
                    on_progress(completed, total);
                },
                Err(e) => {
                    warn!("Chunk {} failed, aborting remaining chunks: {}", ordinal, e);
                    join_set.abort_all();
                    return Err(e);
                },
            }
        }

        let mut output = Vec::new();
        for (ordinal, slot) in slots.into_iter().enumerate() {
            let rows = slot.ok_or_else(|| {
                AppError::Task(format!("chunk {} produced no result", ordinal))
            })?;
            output.extend(rows);
        }
        Ok(output)
    }
}
