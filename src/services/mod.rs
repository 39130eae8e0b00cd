pub mod blob_store;
pub mod completion;
pub mod storage;
pub mod sweeper;
pub mod tracker;
pub mod upload_service;
