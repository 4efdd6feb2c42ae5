pub mod backend;
pub mod client;

pub use backend::{S3Backend, S3BackendConfig};
pub use client::S3Client;
