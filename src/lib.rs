//! # k-vault
//!
//! Uploads large archive files to a cold-storage vault using the multipart
//! upload protocol.
//!
//! ## Features
//!
//! - **Chunk Planning**: Power of two part sizes, never more than 10000 parts
//! - **Tree Hashing**: SHA-256 tree hash checked against every part the service acknowledges
//! - **Parallel Uploads**: Worker pool with per-part retries and linear backoff
//! - **Clean Aborts**: A failed archive never leaves its multipart upload open
//! - **Progress**: Single overwriting status line when attached to a terminal
//!
//! ## Quick Start
//!
//! ```no_run
//! use k_vault::backup::upload_config::VaultUploadConfig;
//!
//! // Load configuration from YAML file
//! let config: VaultUploadConfig = serde_yml::from_reader(std::fs::File::open("config.yml")?)?;
//!
//! // Upload archives one after another
//! config.run(&["backup-2024-01-01.tar.xz"])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
