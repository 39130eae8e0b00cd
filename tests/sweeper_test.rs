use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use tokio::sync::watch;

use video_ingest_backend::config::UploadConfig;
use video_ingest_backend::entities::{prelude::*, *};
use video_ingest_backend::infrastructure::database::run_migrations;
use video_ingest_backend::services::blob_store::{BlobStore, chunk_key};
use video_ingest_backend::services::storage::ChunkStorage;
use video_ingest_backend::services::sweeper::Sweeper;
use video_ingest_backend::services::tracker::{FragmentTracker, InMemoryTracker, TrackerEntry};

struct MockChunkStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockChunkStorage {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChunkStorage for MockChunkStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn fetch(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Key not found"))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

struct SweepContext {
    db: DatabaseConnection,
    storage: Arc<MockChunkStorage>,
    tracker: Arc<dyn FragmentTracker>,
    sweeper: Sweeper,
}

async fn setup_sweeper() -> SweepContext {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1);
    let db = Database::connect(opt).await.unwrap();
    run_migrations(&db).await.unwrap();

    let storage = Arc::new(MockChunkStorage::new());
    let storage_dyn: Arc<dyn ChunkStorage> = storage.clone();
    let tracker: Arc<dyn FragmentTracker> = Arc::new(InMemoryTracker::new());
    let blob_store = Arc::new(BlobStore::new(db.clone(), storage_dyn));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Sweeper::new(
        blob_store,
        tracker.clone(),
        UploadConfig::default(),
        shutdown_rx,
    );

    SweepContext {
        db,
        storage,
        tracker,
        sweeper,
    }
}

/// Seed a session with crafted timestamps plus `received` chunk rows
/// and their stored payloads.
async fn seed_upload(
    ctx: &SweepContext,
    id: &str,
    total: i32,
    received: i32,
    created_minutes_ago: i64,
    idle_minutes: i64,
) {
    let now = Utc::now();
    let session = upload_sessions::ActiveModel {
        id: Set(id.to_string()),
        file_name: Set("clip.mp4".to_string()),
        content_type: Set("video/mp4".to_string()),
        total_chunks: Set(total),
        status: Set("in_progress".to_string()),
        created_at: Set((now - Duration::minutes(created_minutes_ago)).into()),
        last_activity_at: Set((now - Duration::minutes(idle_minutes)).into()),
        completed_at: Set(None),
    };
    UploadSessions::insert(session).exec(&ctx.db).await.unwrap();

    for sequence in 0..received {
        let chunk = upload_chunks::ActiveModel {
            upload_id: Set(id.to_string()),
            sequence: Set(sequence),
            size_bytes: Set(4),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        UploadChunks::insert(chunk).exec(&ctx.db).await.unwrap();
        ctx.storage
            .put(&chunk_key(id, sequence as u32), vec![0u8; 4])
            .await
            .unwrap();
    }
}

async fn session_exists(db: &DatabaseConnection, id: &str) -> bool {
    UploadSessions::find_by_id(id).one(db).await.unwrap().is_some()
}

async fn chunk_rows(db: &DatabaseConnection, id: &str) -> u64 {
    UploadChunks::find()
        .filter(upload_chunks::Column::UploadId.eq(id))
        .count(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sweep_applies_staged_retention_policy() {
    let ctx = setup_sweeper().await;

    // Active half an hour ago: untouchable
    seed_upload(&ctx, "keep-recent", 20, 2, 40, 30).await;
    // 95% done, stale for 90 minutes: progress earns it a reprieve
    seed_upload(&ctx, "keep-nearly-done", 20, 19, 120, 90).await;
    // 60% done but idle three hours: past the escalation window
    seed_upload(&ctx, "drop-stalled", 20, 12, 200, 180).await;
    // 10% done and idle three hours: plain stale
    seed_upload(&ctx, "drop-low", 20, 2, 200, 180).await;

    let deleted = ctx.sweeper.sweep_once().await.unwrap();
    assert_eq!(deleted, 2);

    assert!(session_exists(&ctx.db, "keep-recent").await);
    assert!(session_exists(&ctx.db, "keep-nearly-done").await);
    assert!(!session_exists(&ctx.db, "drop-stalled").await);
    assert!(!session_exists(&ctx.db, "drop-low").await);

    // Index rows and stored payloads of the reclaimed uploads are gone
    assert_eq!(chunk_rows(&ctx.db, "drop-stalled").await, 0);
    assert_eq!(chunk_rows(&ctx.db, "drop-low").await, 0);
    assert!(!ctx.storage.exists(&chunk_key("drop-stalled", 0)).await.unwrap());
    assert!(!ctx.storage.exists(&chunk_key("drop-low", 0)).await.unwrap());

    // Survivors keep theirs
    assert_eq!(chunk_rows(&ctx.db, "keep-nearly-done").await, 19);
    assert!(ctx.storage.exists(&chunk_key("keep-recent", 0)).await.unwrap());
}

#[tokio::test]
async fn test_sweep_hard_ttl_overrides_progress_and_activity() {
    let ctx = setup_sweeper().await;

    // A day old, 95% done, active ten minutes ago: still reclaimed
    seed_upload(&ctx, "ttl-victim", 20, 19, 25 * 60, 10).await;

    let deleted = ctx.sweeper.sweep_once().await.unwrap();
    assert_eq!(deleted, 1);
    assert!(!session_exists(&ctx.db, "ttl-victim").await);
    assert_eq!(chunk_rows(&ctx.db, "ttl-victim").await, 0);
}

#[tokio::test]
async fn test_sweep_clears_tracker_entry() {
    let ctx = setup_sweeper().await;

    seed_upload(&ctx, "doomed", 20, 2, 200, 180).await;
    ctx.tracker
        .insert_if_absent(
            "doomed",
            TrackerEntry::new("clip.mp4".to_string(), "video/mp4".to_string(), 20),
        )
        .await;

    ctx.sweeper.sweep_once().await.unwrap();

    assert!(ctx.tracker.get("doomed").await.is_none());
}

#[tokio::test]
async fn test_sweep_ignores_complete_sessions() {
    let ctx = setup_sweeper().await;
    let now = Utc::now();

    // Complete long ago; retention only applies to in-progress uploads
    let session = upload_sessions::ActiveModel {
        id: Set("done".to_string()),
        file_name: Set("clip.mp4".to_string()),
        content_type: Set("video/mp4".to_string()),
        total_chunks: Set(2),
        status: Set("complete".to_string()),
        created_at: Set((now - Duration::days(3)).into()),
        last_activity_at: Set((now - Duration::days(3)).into()),
        completed_at: Set(Some((now - Duration::days(3)).into())),
    };
    UploadSessions::insert(session).exec(&ctx.db).await.unwrap();

    let deleted = ctx.sweeper.sweep_once().await.unwrap();
    assert_eq!(deleted, 0);
    assert!(session_exists(&ctx.db, "done").await);
}

#[tokio::test]
async fn test_sweep_on_empty_table_is_a_noop() {
    let ctx = setup_sweeper().await;
    assert_eq!(ctx.sweeper.sweep_once().await.unwrap(), 0);
}
