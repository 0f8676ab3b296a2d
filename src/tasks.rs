//! Background refresh queue.
//!
//! Stale reads must never block on the network, so renewals are handed to
//! a worker task through an in-process FIFO channel. The queue deduplicates
//! pending (talent, source) pairs — a hot page can observe the same stale
//! value many times before the refresh lands — and each completed refresh
//! triggers a search-index sync so documents follow the data.

use crate::collectors::{Collectors, RefreshScheduler, Source};
use crate::model::TalentId;
use crate::store::Store;
use crate::sync::{SearchIndex, SyncContext, SyncManager};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "     tasks";

#[derive(Debug, Clone, Copy)]
struct Job {
    talent: TalentId,
    source: Source,
}

/// FIFO queue of refresh jobs, drained by a single worker task.
///
/// Dropping the queue closes the channel; the worker drains what is left
/// and exits, which is what the returned join handle resolves on.
#[derive(Debug)]
pub struct RefreshQueue {
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<Mutex<HashSet<(TalentId, Source)>>>,
}

impl RefreshQueue {
    /// Start the worker and return the queue feeding it.
    pub fn spawn<I>(store: Arc<dyn Store>, collectors: Arc<Collectors>, sync: Arc<SyncManager<I>>) -> (Self, JoinHandle<()>)
    where
        I: SearchIndex + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashSet::new()));

        let handle = tokio::spawn(worker(rx, Arc::clone(&pending), store, collectors, sync));

        (Self { tx, pending }, handle)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashSet<(TalentId, Source)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RefreshScheduler for RefreshQueue {
    fn schedule(&self, talent: TalentId, source: Source) {
        {
            let mut pending = self.lock_pending();
            if !pending.insert((talent, source)) {
                log::debug!(target: LOG_TARGET, "Refresh of {source} for talent {talent} already queued");
                return;
            }
        }

        if self.tx.send(Job { talent, source }).is_err() {
            // Worker is gone; drop the reservation so nothing leaks.
            let _ = self.lock_pending().remove(&(talent, source));
            log::warn!(target: LOG_TARGET, "Refresh queue is closed; dropping {source} refresh for talent {talent}");
        }
    }
}

async fn worker<I>(
    mut rx: mpsc::UnboundedReceiver<Job>,
    pending: Arc<Mutex<HashSet<(TalentId, Source)>>>,
    store: Arc<dyn Store>,
    collectors: Arc<Collectors>,
    sync: Arc<SyncManager<I>>,
) where
    I: SearchIndex,
{
    while let Some(job) = rx.recv().await {
        // Clear the reservation first so a refresh arriving while we work
        // gets queued again rather than silently dropped.
        let _ = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(job.talent, job.source));

        let Some(talent) = store.talent(job.talent) else {
            log::debug!(target: LOG_TARGET, "Skipping refresh for deleted talent {}", job.talent);
            continue;
        };

        match collectors.refresh(job.source, &talent, false).await {
            Ok(()) => sync.sync(&talent, SyncContext::immediate()).await,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "{} refresh failed for talent {}: {e:#}", job.source, talent.id);
            }
        }
    }

    log::debug!(target: LOG_TARGET, "Refresh queue closed; worker exiting");
}
