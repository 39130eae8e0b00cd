use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::info;

use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::storage::ChunkStorage;

pub type AssembledStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Object key for one chunk payload. Zero-padded so bucket listings
/// come out in sequence order when debugging against storage directly.
pub fn chunk_key(upload_id: &str, sequence: u32) -> String {
    format!("uploads/{}/{:08}", upload_id, sequence)
}

/// Durable side of an upload: chunk payloads in the storage backend,
/// session and chunk index rows in the database. Everything the tracker
/// knows can be rebuilt from here.
pub struct BlobStore {
    db: DatabaseConnection,
    storage: Arc<dyn ChunkStorage>,
}

impl BlobStore {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn ChunkStorage>) -> Self {
        Self { db, storage }
    }

    /// Insert the session row unless it already exists. Losing the race
    /// against a concurrent first chunk is fine, the winner's metadata
    /// stands.
    pub async fn create_session(
        &self,
        id: &str,
        file_name: &str,
        content_type: &str,
        total_chunks: u32,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let session = upload_sessions::ActiveModel {
            id: Set(id.to_string()),
            file_name: Set(file_name.to_string()),
            content_type: Set(content_type.to_string()),
            total_chunks: Set(total_chunks as i32),
            status: Set("in_progress".to_string()),
            created_at: Set(now.into()),
            last_activity_at: Set(now.into()),
            completed_at: Set(None),
        };

        let insert = UploadSessions::insert(session)
            .on_conflict(
                OnConflict::column(upload_sessions::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&self.db)
            .await;

        match insert {
            Ok(_) => {
                info!("📼 Upload session {} established ({} chunks expected)", id, total_chunks);
                Ok(())
            }
            // do_nothing reports this when the row was already there
            Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load_session(
        &self,
        id: &str,
    ) -> Result<Option<upload_sessions::Model>, AppError> {
        Ok(UploadSessions::find_by_id(id).one(&self.db).await?)
    }

    /// Persist one chunk payload and its index row, and touch the
    /// session's activity timestamp. The payload goes to storage first
    /// so a crash between the writes leaves at worst an orphan object,
    /// never an index row without bytes behind it. Re-sending a
    /// sequence overwrites both, which makes retries safe.
    pub async fn write_chunk(
        &self,
        upload_id: &str,
        sequence: u32,
        payload: Vec<u8>,
    ) -> Result<(), AppError> {
        let size = payload.len();
        let key = chunk_key(upload_id, sequence);

        self.storage
            .put(&key, payload)
            .await
            .map_err(|e| AppError::Storage(format!("failed to store chunk {}: {}", key, e)))?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let chunk = upload_chunks::ActiveModel {
            upload_id: Set(upload_id.to_string()),
            sequence: Set(sequence as i32),
            size_bytes: Set(size as i64),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        UploadChunks::insert(chunk)
            .on_conflict(
                OnConflict::columns([
                    upload_chunks::Column::UploadId,
                    upload_chunks::Column::Sequence,
                ])
                .update_columns([
                    upload_chunks::Column::SizeBytes,
                    upload_chunks::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&txn)
            .await?;

        UploadSessions::update_many()
            .col_expr(
                upload_sessions::Column::LastActivityAt,
                Expr::value(DateTimeWithTimeZone::from(now)),
            )
            .filter(upload_sessions::Column::Id.eq(upload_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Distinct sequences with an index row, ascending.
    pub async fn list_sequences(&self, upload_id: &str) -> Result<BTreeSet<u32>, AppError> {
        let rows = UploadChunks::find()
            .filter(upload_chunks::Column::UploadId.eq(upload_id))
            .order_by_asc(upload_chunks::Column::Sequence)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|r| r.sequence as u32).collect())
    }

    pub async fn count_sequences(&self, upload_id: &str) -> Result<u64, AppError> {
        Ok(UploadChunks::find()
            .filter(upload_chunks::Column::UploadId.eq(upload_id))
            .count(&self.db)
            .await?)
    }

    /// Flip the session to complete, exactly once. Returns whether this
    /// call performed the transition; retries of the final chunk see
    /// `false` and leave `completed_at` alone.
    pub async fn mark_complete(&self, upload_id: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        let result = UploadSessions::update_many()
            .col_expr(upload_sessions::Column::Status, Expr::value("complete"))
            .col_expr(
                upload_sessions::Column::CompletedAt,
                Expr::value(Some(DateTimeWithTimeZone::from(now))),
            )
            .filter(upload_sessions::Column::Id.eq(upload_id))
            .filter(upload_sessions::Column::Status.eq("in_progress"))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Remove every trace of an upload: stored payloads, index rows,
    /// session row. A storage delete failure aborts before the rows go,
    /// so the next sweep still sees the session and retries.
    pub async fn delete_session(&self, upload_id: &str) -> Result<(), AppError> {
        let rows = UploadChunks::find()
            .filter(upload_chunks::Column::UploadId.eq(upload_id))
            .all(&self.db)
            .await?;

        for row in &rows {
            let key = chunk_key(upload_id, row.sequence as u32);
            self.storage
                .delete(&key)
                .await
                .map_err(|e| AppError::Storage(format!("failed to delete chunk {}: {}", key, e)))?;
        }

        UploadChunks::delete_many()
            .filter(upload_chunks::Column::UploadId.eq(upload_id))
            .exec(&self.db)
            .await?;

        UploadSessions::delete_by_id(upload_id).exec(&self.db).await?;

        info!("🧹 Deleted upload {} ({} chunks)", upload_id, rows.len());
        Ok(())
    }

    /// Stream the assembled blob, chunk payloads in ascending sequence
    /// order. Chunks are fetched lazily as the consumer reads, so the
    /// full video never sits in memory.
    pub async fn assemble(&self, upload_id: &str) -> Result<AssembledStream, AppError> {
        let session = self
            .load_session(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown upload: {}", upload_id)))?;

        let storage = self.storage.clone();
        let id = upload_id.to_string();
        let total = session.total_chunks as u32;

        let stream = stream! {
            for sequence in 0..total {
                let key = chunk_key(&id, sequence);
                match storage.fetch(&key).await {
                    Ok(data) => yield Ok(Bytes::from(data)),
                    Err(e) => {
                        yield Err(std::io::Error::other(format!(
                            "failed to read chunk {}: {}",
                            key, e
                        )));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Every in-progress session, oldest activity first.
    pub async fn list_in_progress(&self) -> Result<Vec<upload_sessions::Model>, AppError> {
        Ok(UploadSessions::find()
            .filter(upload_sessions::Column::Status.eq("in_progress"))
            .order_by_asc(upload_sessions::Column::LastActivityAt)
            .all(&self.db)
            .await?)
    }
}
