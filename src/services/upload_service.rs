use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::entities::upload_sessions;
use crate::services::blob_store::{AssembledStream, BlobStore};
use crate::services::completion::is_complete;
use crate::services::tracker::{FragmentTracker, TrackerEntry};
use crate::utils::keyed_mutex::KeyedMutex;

/// Metadata every chunk call carries about the upload it belongs to.
#[derive(Debug, Clone, Validate)]
pub struct ChunkMeta {
    #[validate(range(min = 1, max = 100_000))]
    pub total_chunks: u32,
    #[validate(length(min = 1, max = 512))]
    pub file_name: String,
    #[validate(length(min = 1, max = 255))]
    pub content_type: String,
}

/// One chunk submission. The first chunk of an upload may leave the id
/// to the server; every later chunk must name the upload it belongs to,
/// which the type makes impossible to get wrong.
#[derive(Debug)]
pub enum ChunkRequest {
    First {
        upload_id: Option<String>,
        meta: ChunkMeta,
    },
    Subsequent {
        upload_id: String,
        sequence: u32,
        meta: ChunkMeta,
    },
}

/// Result of one chunk submission.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub upload_id: String,
    pub received_count: u32,
    pub total_chunks: u32,
    pub complete: bool,
}

enum Reconstructed {
    Tracked(TrackerEntry),
    AlreadyComplete(u32),
}

/// Orchestrates one chunk call end to end: size gate, session lookup or
/// establishment, durable write, tracker update, completion check.
pub struct UploadService {
    blob_store: Arc<BlobStore>,
    tracker: Arc<dyn FragmentTracker>,
    config: UploadConfig,
    rebuild_lock: KeyedMutex,
}

impl UploadService {
    pub fn new(
        blob_store: Arc<BlobStore>,
        tracker: Arc<dyn FragmentTracker>,
        config: UploadConfig,
    ) -> Self {
        Self {
            blob_store,
            tracker,
            config,
            rebuild_lock: KeyedMutex::new(),
        }
    }

    pub async fn submit_chunk(
        &self,
        request: ChunkRequest,
        payload: Vec<u8>,
    ) -> Result<ChunkOutcome, AppError> {
        // Size gate comes before any write or session establishment
        if payload.len() > self.config.max_chunk_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "chunk is {} bytes, limit is {}",
                payload.len(),
                self.config.max_chunk_bytes
            )));
        }

        let (upload_id, sequence, meta) = match request {
            ChunkRequest::First { upload_id, meta } => (
                upload_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                0,
                meta,
            ),
            ChunkRequest::Subsequent {
                upload_id,
                sequence,
                meta,
            } => (upload_id, sequence, meta),
        };

        if sequence >= meta.total_chunks {
            return Err(AppError::InvalidRequest(format!(
                "sequence {} is out of range for {} chunks",
                sequence, meta.total_chunks
            )));
        }

        let entry = match self.tracker.get(&upload_id).await {
            Some(entry) => entry,
            None => match self.reconstruct(&upload_id, &meta).await? {
                Reconstructed::Tracked(entry) => entry,
                Reconstructed::AlreadyComplete(total) => {
                    // Retried final chunks of a finished upload get the
                    // same answer they got the first time, without new
                    // writes
                    if meta.total_chunks != total {
                        return Err(AppError::InvalidRequest(format!(
                            "totalChunks {} does not match {} declared when the upload started",
                            meta.total_chunks, total
                        )));
                    }
                    return Ok(ChunkOutcome {
                        upload_id,
                        received_count: total,
                        total_chunks: total,
                        complete: true,
                    });
                }
            },
        };

        if entry.total_chunks != meta.total_chunks {
            return Err(AppError::InvalidRequest(format!(
                "totalChunks {} does not match {} declared when the upload started",
                meta.total_chunks, entry.total_chunks
            )));
        }

        self.blob_store
            .write_chunk(&upload_id, sequence, payload)
            .await?;

        let outcome = match self.tracker.record(&upload_id, sequence).await {
            Some(outcome) => outcome,
            None => {
                // The entry vanished between lookup and record (swept,
                // or another replica restarted us). The chunk itself is
                // already durable, so rebuild and record again.
                match self.reconstruct(&upload_id, &meta).await? {
                    Reconstructed::Tracked(_) => self
                        .tracker
                        .record(&upload_id, sequence)
                        .await
                        .ok_or_else(|| {
                            AppError::Internal(format!(
                                "tracker refused rebuilt upload {}",
                                upload_id
                            ))
                        })?,
                    Reconstructed::AlreadyComplete(total) => {
                        if meta.total_chunks != total {
                            return Err(AppError::InvalidRequest(format!(
                                "totalChunks {} does not match {} declared when the upload started",
                                meta.total_chunks, total
                            )));
                        }
                        return Ok(ChunkOutcome {
                            upload_id,
                            received_count: total,
                            total_chunks: total,
                            complete: true,
                        });
                    }
                }
            }
        };

        if is_complete(outcome.received_count, outcome.total_chunks) {
            let transitioned = self.blob_store.mark_complete(&upload_id).await?;
            if transitioned {
                info!(
                    "🎬 Upload {} complete ({} chunks), blob ready",
                    upload_id, outcome.total_chunks
                );
            }
            self.tracker.remove(&upload_id).await;

            return Ok(ChunkOutcome {
                upload_id,
                received_count: outcome.received_count,
                total_chunks: outcome.total_chunks,
                complete: true,
            });
        }

        Ok(ChunkOutcome {
            upload_id,
            received_count: outcome.received_count,
            total_chunks: outcome.total_chunks,
            complete: false,
        })
    }

    /// Current progress of an upload, straight from durable state.
    pub async fn status(
        &self,
        upload_id: &str,
    ) -> Result<(upload_sessions::Model, Vec<u32>), AppError> {
        let session = self
            .blob_store
            .load_session(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown upload: {}", upload_id)))?;

        let sequences = self.blob_store.list_sequences(upload_id).await?;
        Ok((session, sequences.into_iter().collect()))
    }

    /// Discard an upload and everything stored for it.
    pub async fn cancel(&self, upload_id: &str) -> Result<(), AppError> {
        self.blob_store
            .load_session(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown upload: {}", upload_id)))?;

        self.blob_store.delete_session(upload_id).await?;
        self.tracker.remove(upload_id).await;
        Ok(())
    }

    /// The assembled blob of a complete upload, as a lazy stream.
    pub async fn assembled(
        &self,
        upload_id: &str,
    ) -> Result<(upload_sessions::Model, AssembledStream), AppError> {
        let session = self
            .blob_store
            .load_session(upload_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("unknown upload: {}", upload_id)))?;

        if session.status != "complete" {
            return Err(AppError::InvalidRequest(format!(
                "upload {} is not complete yet",
                upload_id
            )));
        }

        let stream = self.blob_store.assemble(upload_id).await?;
        Ok((session, stream))
    }

    /// Bring an upload back into the tracker from durable state, or
    /// establish it fresh from this call's metadata. Chunks arrive in
    /// any order, so the establishing call does not have to be sequence
    /// zero. Serialized per upload id so concurrent misses rebuild once.
    async fn reconstruct(
        &self,
        upload_id: &str,
        meta: &ChunkMeta,
    ) -> Result<Reconstructed, AppError> {
        let guard = self.rebuild_lock.lock(upload_id).await;

        // Another call may have rebuilt while we waited on the lock
        if let Some(entry) = self.tracker.get(upload_id).await {
            drop(guard);
            self.rebuild_lock.cleanup();
            return Ok(Reconstructed::Tracked(entry));
        }

        let result = match self.blob_store.load_session(upload_id).await? {
            Some(session) if session.status == "complete" => {
                Reconstructed::AlreadyComplete(session.total_chunks as u32)
            }
            Some(session) => {
                let received = self.blob_store.list_sequences(upload_id).await?;
                info!(
                    "📂 Rebuilt tracker for upload {} ({}/{} chunks on record)",
                    upload_id,
                    received.len(),
                    session.total_chunks
                );
                let mut entry = TrackerEntry::new(
                    session.file_name,
                    session.content_type,
                    session.total_chunks as u32,
                );
                entry.received = received;
                Reconstructed::Tracked(self.tracker.insert_if_absent(upload_id, entry).await)
            }
            None => {
                self.blob_store
                    .create_session(
                        upload_id,
                        &meta.file_name,
                        &meta.content_type,
                        meta.total_chunks,
                    )
                    .await?;
                let entry = TrackerEntry::new(
                    meta.file_name.clone(),
                    meta.content_type.clone(),
                    meta.total_chunks,
                );
                Reconstructed::Tracked(self.tracker.insert_if_absent(upload_id, entry).await)
            }
        };

        drop(guard);
        self.rebuild_lock.cleanup();

        Ok(result)
    }
}
