//! Multipart archive upload to a vault: planning, tree hashing, the worker
//! pool and the per-archive session.

pub mod chunk_plan;
pub mod client;
pub mod coordinator;
pub mod job;
pub mod progress;
pub mod scratch;
pub mod session;
pub mod tree_hash;
pub mod uploader;
