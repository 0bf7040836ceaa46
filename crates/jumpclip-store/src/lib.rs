//! Job, catalog and media repositories.
//!
//! This crate provides:
//! - [`JobStore`] with an atomic queued -> running claim
//! - [`CatalogStore`] for the read-only videos, sessions and jumps
//! - [`MediaStore`] for create-once media records
//! - [`MemoryStore`] and [`FirestoreStore`] backends

pub mod error;
pub mod firestore;
pub mod memory;
pub mod patch;
pub mod repo;

pub use error::{StoreError, StoreResult};
pub use firestore::{FirestoreClient, FirestoreConfig, FirestoreError, FirestoreStore};
pub use memory::MemoryStore;
pub use patch::JobPatch;
pub use repo::{CatalogStore, ClaimOutcome, JobStore, MediaStore};
