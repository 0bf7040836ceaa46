//! Firestore backend over the REST API.

mod client;
mod error;
pub mod metrics;
mod retry;
mod store;
mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use store::FirestoreStore;
