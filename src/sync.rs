//! Search index synchronization.
//!
//! Whenever a talent's data changes — any collector finishing a refresh,
//! an import completing — a flat document combining identity fields, every
//! collector's current cached value, and the score is pushed to the search
//! index. Pushes are fire-and-forget from the caller's point of view:
//! failures are logged and swallowed, never surfaced to whatever triggered
//! the update.
//!
//! During a bulk import every talent is touched many times in a row;
//! [`SyncContext`] lets the importer suppress the per-touch pushes and do
//! one pass at the end instead.

use crate::Result;
use crate::cache::TalentCache;
use crate::collectors::TalentFacts;
use crate::model::{Talent, TalentId, TalentKind};
use crate::score::ScoreEngine;
use futures_util::future::join_all;
use ohno::{EnrichableExt, app_err};
use serde::Serialize;

const LOG_TARGET: &str = "      sync";

/// Whether the current operation is part of a bulk import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncContext {
    bulk_import: bool,
}

impl SyncContext {
    /// Normal operation: every update is pushed immediately.
    #[must_use]
    pub const fn immediate() -> Self {
        Self { bulk_import: false }
    }

    /// Bulk import in progress: suppress per-update pushes.
    #[must_use]
    pub const fn bulk_import() -> Self {
        Self { bulk_import: true }
    }
}

/// The flat document pushed to the search index.
#[derive(Debug, Serialize)]
pub struct TalentDocument {
    pub id: TalentId,
    pub slug: String,
    pub name: String,
    pub kind: TalentKind,
    pub content: String,
    pub job_title: Option<String>,
    pub is_vip: bool,
    pub score: u64,

    #[serde(flatten)]
    pub facts: TalentFacts,
}

/// The remote search index, as seen by the sync layer.
pub trait SearchIndex: Send + Sync {
    /// Create or replace the document for one talent.
    fn index(&self, document: &TalentDocument) -> impl Future<Output = Result<()>> + Send;

    /// Remove a talent's document.
    fn delete(&self, id: TalentId) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP search index: documents live at `{base}/talent/{id}`.
#[derive(Debug, Clone)]
pub struct HttpIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIndex {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn document_url(&self, id: TalentId) -> String {
        format!("{}/talent/{id}", self.base_url)
    }
}

impl SearchIndex for HttpIndex {
    async fn index(&self, document: &TalentDocument) -> Result<()> {
        let url = self.document_url(document.id);
        let response = self
            .client
            .put(&url)
            .json(document)
            .send()
            .await
            .map_err(|e| ohno::AppError::new(e).enrich_with(|| format!("unable to index document at '{url}'")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(app_err!("unable to index document at '{url}': status {status}"));
        }
        Ok(())
    }

    async fn delete(&self, id: TalentId) -> Result<()> {
        let url = self.document_url(id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| ohno::AppError::new(e).enrich_with(|| format!("unable to delete document at '{url}'")))?;

        let status = response.status();
        // Deleting an unindexed talent is a no-op, not a failure.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(app_err!("unable to delete document at '{url}': status {status}"));
        }
        Ok(())
    }
}

/// An optionally-configured index: hosts without a search backend get a
/// sync layer that assembles documents but only logs them.
#[derive(Debug, Clone)]
pub enum IndexTarget {
    Http(HttpIndex),
    Disabled,
}

impl SearchIndex for IndexTarget {
    async fn index(&self, document: &TalentDocument) -> Result<()> {
        match self {
            Self::Http(index) => index.index(document).await,
            Self::Disabled => {
                log::debug!(target: LOG_TARGET, "No index configured; dropping document for talent {}", document.id);
                Ok(())
            }
        }
    }

    async fn delete(&self, id: TalentId) -> Result<()> {
        match self {
            Self::Http(index) => index.delete(id).await,
            Self::Disabled => Ok(()),
        }
    }
}

/// Assembles documents and pushes them to a [`SearchIndex`].
#[derive(Debug)]
pub struct SyncManager<I> {
    index: I,
    cache: TalentCache,
    engine: ScoreEngine,
}

impl<I: SearchIndex> SyncManager<I> {
    #[must_use]
    pub fn new(index: I, cache: TalentCache) -> Self {
        let engine = ScoreEngine::new(cache.clone());
        Self { index, cache, engine }
    }

    /// Assemble the current document for one talent.
    pub fn document(&self, talent: &Talent) -> Result<TalentDocument> {
        Ok(TalentDocument {
            id: talent.id,
            slug: talent.slug.clone(),
            name: talent.name.clone(),
            kind: talent.kind,
            content: talent.content.clone(),
            job_title: talent.job_title.clone(),
            is_vip: talent.is_vip,
            score: self.engine.score(talent, false)?,
            facts: TalentFacts::load(&self.cache, talent.id),
        })
    }

    /// Push a talent's current document, unless a bulk import is running.
    /// Failures are logged, never propagated.
    pub async fn sync(&self, talent: &Talent, ctx: SyncContext) {
        if ctx.bulk_import {
            log::debug!(target: LOG_TARGET, "Skipping sync for talent {} during bulk import", talent.id);
            return;
        }

        let document = match self.document(talent) {
            Ok(document) => document,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Unable to assemble document for talent {}: {e:#}", talent.id);
                return;
            }
        };

        if let Err(e) = self.index.index(&document).await {
            log::warn!(target: LOG_TARGET, "Sync failed for talent {}: {e:#}", talent.id);
        } else {
            log::debug!(target: LOG_TARGET, "Synced talent {}", talent.id);
        }
    }

    /// Push every talent's document concurrently; used after a bulk import
    /// completes.
    pub async fn sync_all(&self, talents: &[Talent]) {
        let _ = join_all(talents.iter().map(|talent| self.sync(talent, SyncContext::immediate()))).await;
    }

    /// Remove a talent's document. Failures are logged, never propagated.
    pub async fn remove(&self, id: TalentId) {
        if let Err(e) = self.index.delete(id).await {
            log::warn!(target: LOG_TARGET, "Unable to remove document for talent {id}: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct RecordingIndex {
        indexed: Mutex<Vec<(TalentId, u64)>>,
        deleted: Mutex<Vec<TalentId>>,
    }

    impl SearchIndex for &RecordingIndex {
        async fn index(&self, document: &TalentDocument) -> Result<()> {
            self.indexed.lock().unwrap().push((document.id, document.score));
            Ok(())
        }

        async fn delete(&self, id: TalentId) -> Result<()> {
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingIndex;

    impl SearchIndex for FailingIndex {
        async fn index(&self, _document: &TalentDocument) -> Result<()> {
            Err(app_err!("index unavailable"))
        }

        async fn delete(&self, _id: TalentId) -> Result<()> {
            Err(app_err!("index unavailable"))
        }
    }

    fn setup() -> (TalentCache, Talent) {
        let store = Arc::new(MemoryStore::new());
        let talent = store
            .create_talent("johndoe", "John Doe", crate::model::TalentKind::Person)
            .unwrap();
        (TalentCache::new(store), talent)
    }

    #[tokio::test]
    async fn sync_pushes_the_assembled_document() {
        let (cache, talent) = setup();
        let index = RecordingIndex::default();
        let manager = SyncManager::new(&index, cache);

        manager.sync(&talent, SyncContext::immediate()).await;

        let indexed = index.indexed.lock().unwrap();
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].0, talent.id);
        assert!(indexed[0].1 >= 1);
    }

    #[tokio::test]
    async fn bulk_import_suppresses_pushes() {
        let (cache, talent) = setup();
        let index = RecordingIndex::default();
        let manager = SyncManager::new(&index, cache);

        manager.sync(&talent, SyncContext::bulk_import()).await;

        assert!(index.indexed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_failures_are_swallowed() {
        let (cache, talent) = setup();
        let manager = SyncManager::new(FailingIndex, cache);

        // Must not panic or propagate.
        manager.sync(&talent, SyncContext::immediate()).await;
        manager.remove(talent.id).await;
    }

    #[tokio::test]
    async fn sync_all_pushes_one_document_per_talent() {
        let store = Arc::new(MemoryStore::new());
        let first = store
            .create_talent("johndoe", "John Doe", crate::model::TalentKind::Person)
            .unwrap();
        let second = store
            .create_talent("janedoe", "Jane Doe", crate::model::TalentKind::Person)
            .unwrap();

        let index = RecordingIndex::default();
        let manager = SyncManager::new(&index, TalentCache::new(store));

        manager.sync_all(&[first.clone(), second.clone()]).await;

        let indexed = index.indexed.lock().unwrap();
        assert_eq!(indexed.len(), 2);
        assert!(indexed.iter().any(|(id, _)| *id == first.id));
        assert!(indexed.iter().any(|(id, _)| *id == second.id));
    }

    #[tokio::test]
    async fn remove_targets_the_right_document() {
        let (cache, talent) = setup();
        let index = RecordingIndex::default();
        let manager = SyncManager::new(&index, cache);

        manager.remove(talent.id).await;
        assert_eq!(*index.deleted.lock().unwrap(), vec![talent.id]);
    }

    #[test]
    fn document_embeds_identity_and_score() {
        let (cache, talent) = setup();
        let manager = SyncManager::new(FailingIndex, cache);

        let document = manager.document(&talent).unwrap();
        assert_eq!(document.slug, "johndoe");
        assert!(document.score >= 1);

        let json = serde_json::to_value(&document).unwrap();
        assert!(json.get("plugins").is_some());
        assert!(json.get("profile").is_some());
    }
}
