use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::error::AppError;
use crate::services::upload_service::{ChunkMeta, ChunkRequest};

/// Multipart fields as they arrive off the wire, before any validation.
/// `chunk_file_name` and `chunk_content_type` come from the file part
/// itself and only matter when the explicit text fields are absent.
#[derive(Debug, Default)]
pub struct RawChunkFields {
    pub upload_id: Option<String>,
    pub sequence: Option<String>,
    pub total_chunks: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub chunk_file_name: Option<String>,
    pub chunk_content_type: Option<String>,
}

impl RawChunkFields {
    /// Validate the raw fields and shape them into a chunk request.
    /// Whether the call needs an upload id depends on the sequence, so
    /// parsing decides which variant it becomes.
    pub fn into_request(self) -> Result<(ChunkRequest, Vec<u8>), AppError> {
        let sequence: u32 = self
            .sequence
            .as_deref()
            .ok_or_else(|| AppError::InvalidRequest("sequence field is required".to_string()))?
            .trim()
            .parse()
            .map_err(|_| {
                AppError::InvalidRequest("sequence must be a non-negative integer".to_string())
            })?;

        let total_chunks: u32 = self
            .total_chunks
            .as_deref()
            .ok_or_else(|| AppError::InvalidRequest("totalChunks field is required".to_string()))?
            .trim()
            .parse()
            .map_err(|_| {
                AppError::InvalidRequest("totalChunks must be a positive integer".to_string())
            })?;

        // Explicit text fields win over whatever the file part reported
        // about itself
        let file_name = self
            .file_name
            .or(self.chunk_file_name)
            .ok_or_else(|| AppError::InvalidRequest("fileName field is required".to_string()))?;

        let content_type = self
            .content_type
            .or(self.chunk_content_type)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let meta = ChunkMeta {
            total_chunks,
            file_name,
            content_type,
        };
        meta.validate()
            .map_err(|e| AppError::InvalidRequest(format!("invalid chunk metadata: {}", e)))?;

        let payload = self
            .payload
            .ok_or_else(|| AppError::InvalidRequest("chunk payload part is required".to_string()))?;

        let upload_id = self.upload_id.filter(|id| !id.trim().is_empty());

        let request = if sequence == 0 {
            ChunkRequest::First { upload_id, meta }
        } else {
            let upload_id = upload_id.ok_or_else(|| {
                AppError::InvalidRequest("uploadId is required after the first chunk".to_string())
            })?;
            ChunkRequest::Subsequent {
                upload_id,
                sequence,
                meta,
            }
        };

        Ok((request, payload))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitChunkResponse {
    /// Id of the upload this chunk landed in. Callers that let the
    /// server mint the id read it from here.
    pub upload_id: String,
    pub accepted: bool,
    /// Distinct sequences received so far. Duplicates never move this.
    pub received_count: u32,
    pub total_chunks: u32,
    pub complete: bool,
    /// Set once the upload is complete. The assembled blob is addressed
    /// by this id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembled_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub file_name: String,
    pub content_type: String,
    pub total_chunks: u32,
    pub received_count: u32,
    pub received_sequences: Vec<u32>,
    pub complete: bool,
    pub created_at: DateTimeWithTimeZone,
    pub last_activity_at: DateTimeWithTimeZone,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelUploadResponse {
    pub upload_id: String,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sequence: &str, upload_id: Option<&str>) -> RawChunkFields {
        RawChunkFields {
            upload_id: upload_id.map(|s| s.to_string()),
            sequence: Some(sequence.to_string()),
            total_chunks: Some("3".to_string()),
            file_name: Some("clip.mp4".to_string()),
            content_type: Some("video/mp4".to_string()),
            payload: Some(vec![1, 2, 3]),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_chunk_without_id() {
        let (request, payload) = raw("0", None).into_request().unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
        match request {
            ChunkRequest::First { upload_id, meta } => {
                assert!(upload_id.is_none());
                assert_eq!(meta.total_chunks, 3);
            }
            _ => panic!("expected First"),
        }
    }

    #[test]
    fn test_first_chunk_with_caller_id() {
        let (request, _) = raw("0", Some("vid-1")).into_request().unwrap();
        match request {
            ChunkRequest::First { upload_id, .. } => {
                assert_eq!(upload_id.as_deref(), Some("vid-1"));
            }
            _ => panic!("expected First"),
        }
    }

    #[test]
    fn test_subsequent_chunk_requires_id() {
        let err = raw("1", None).into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_blank_upload_id_counts_as_absent() {
        let err = raw("2", Some("  ")).into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_subsequent_chunk_parses() {
        let (request, _) = raw("2", Some("vid-1")).into_request().unwrap();
        match request {
            ChunkRequest::Subsequent {
                upload_id,
                sequence,
                ..
            } => {
                assert_eq!(upload_id, "vid-1");
                assert_eq!(sequence, 2);
            }
            _ => panic!("expected Subsequent"),
        }
    }

    #[test]
    fn test_rejects_non_numeric_sequence() {
        let err = raw("two", Some("vid-1")).into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_rejects_negative_sequence() {
        let err = raw("-1", Some("vid-1")).into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_rejects_zero_total_chunks() {
        let mut fields = raw("0", None);
        fields.total_chunks = Some("0".to_string());
        let err = fields.into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_rejects_missing_payload() {
        let mut fields = raw("0", None);
        fields.payload = None;
        let err = fields.into_request().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn test_explicit_file_name_wins_over_part_metadata() {
        let mut fields = raw("0", None);
        fields.chunk_file_name = Some("blob".to_string());
        let (request, _) = fields.into_request().unwrap();
        match request {
            ChunkRequest::First { meta, .. } => assert_eq!(meta.file_name, "clip.mp4"),
            _ => panic!("expected First"),
        }
    }

    #[test]
    fn test_part_metadata_fills_missing_fields() {
        let mut fields = raw("0", None);
        fields.file_name = None;
        fields.content_type = None;
        fields.chunk_file_name = Some("recording.webm".to_string());
        fields.chunk_content_type = Some("video/webm".to_string());
        let (request, _) = fields.into_request().unwrap();
        match request {
            ChunkRequest::First { meta, .. } => {
                assert_eq!(meta.file_name, "recording.webm");
                assert_eq!(meta.content_type, "video/webm");
            }
            _ => panic!("expected First"),
        }
    }
}
