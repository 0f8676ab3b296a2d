//! Refresh queue tests: a stale read schedules a background refresh, the
//! worker performs it, and the refreshed talent is synced to the index.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use talent_rank::Result;
use talent_rank::collectors::profile::ProfileData;
use talent_rank::collectors::{Collectors, ReadContext, RefreshScheduler, Source};
use talent_rank::config::Sources;
use talent_rank::model::{TalentId, TalentKind};
use talent_rank::store::{MemoryStore, Store};
use talent_rank::sync::{SearchIndex, SyncManager, TalentDocument};
use talent_rank::tasks::RefreshQueue;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct RecordingIndex {
    indexed: Mutex<Vec<TalentId>>,
}

#[derive(Debug, Clone)]
struct IndexHandle(Arc<RecordingIndex>);

impl SearchIndex for IndexHandle {
    async fn index(&self, document: &TalentDocument) -> Result<()> {
        self.0.indexed.lock().unwrap().push(document.id);
        Ok(())
    }

    async fn delete(&self, _id: TalentId) -> Result<()> {
        Ok(())
    }
}

const PROFILE_PAGE: &str = r#"<html><body><h2 class="fn">John Doe</h2></body></html>"#;

#[tokio::test]
async fn stale_read_triggers_background_refresh_and_sync() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profiles/johndoe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let talent = store.create_talent("johndoe", "John Doe", TalentKind::Person).unwrap();
    let collectors = Arc::new(Collectors::new(store.clone(), Sources::for_base(&server.uri())).unwrap());

    let index = Arc::new(RecordingIndex::default());
    let sync = Arc::new(SyncManager::new(IndexHandle(Arc::clone(&index)), collectors.cache().clone()));

    let (queue, worker) = RefreshQueue::spawn(store.clone() as Arc<dyn Store>, Arc::clone(&collectors), sync);

    // Seed an already-expired profile entry.
    let stale = ProfileData {
        name: "Old Name".to_owned(),
        ..ProfileData::default()
    };
    let expired = chrono::Utc::now() - chrono::Duration::hours(1);
    collectors
        .cache()
        .put_at(talent.id, Source::Profile.key(), &stale, Duration::from_secs(1), expired)
        .unwrap();

    // The read returns the stale value immediately and queues a renewal.
    let observed = collectors.profile().get(&talent, ReadContext::interactive(), &queue);
    assert_eq!(observed.name, "Old Name");

    // Wait for the worker to refresh and sync.
    for _ in 0..250 {
        if !index.indexed.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(*index.indexed.lock().unwrap(), vec![talent.id]);

    let refreshed = collectors.profile().get(&talent, ReadContext::cached_only(), &queue);
    assert_eq!(refreshed.name, "John Doe");

    drop(queue);
    worker.await.unwrap();
}

#[tokio::test]
async fn deleted_talents_are_skipped_quietly() {
    let server = MockServer::start().await;

    let store = Arc::new(MemoryStore::new());
    let collectors = Arc::new(Collectors::new(store.clone(), Sources::for_base(&server.uri())).unwrap());
    let index = Arc::new(RecordingIndex::default());
    let sync = Arc::new(SyncManager::new(IndexHandle(Arc::clone(&index)), collectors.cache().clone()));

    let (queue, worker) = RefreshQueue::spawn(store.clone() as Arc<dyn Store>, collectors, sync);

    queue.schedule(TalentId(999), Source::Profile);

    drop(queue);
    worker.await.unwrap();

    assert!(index.indexed.lock().unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
