pub use super::upload_chunks::Entity as UploadChunks;
pub use super::upload_sessions::Entity as UploadSessions;
