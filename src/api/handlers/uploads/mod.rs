pub mod blob;
pub mod cancel;
pub mod status;
pub mod submit;
pub mod types;
