//! Document store abstraction the ledger is written against.
//!
//! A store keeps one JSON document per path together with a version tag that
//! increases on every committed write. Atomic read-modify-write is built on
//! top of the conditional write in [`transaction::run_transaction`].

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use futures::stream::BoxStream;

mod listeners;
pub mod memory;
pub mod sqlite;
pub mod transaction;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use transaction::{DEFAULT_MAX_ATTEMPTS, run_transaction};

pub type Document = serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn new(collection: &str, id: impl fmt::Display) -> Self {
        DocumentPath(format!("{}/{}", collection, id))
    }

    pub(crate) fn from_stored(path: String) -> Self {
        DocumentPath(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn in_collection(&self, collection: &str) -> bool {
        self.0
            .strip_prefix(collection)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document body as of a specific committed version.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub body: Document,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed(u64),
    /// The stored version no longer matched the expected one; nothing was written.
    Conflict,
}

pub type SnapshotStream = BoxStream<'static, Result<Option<Snapshot>, StoreError>>;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StoreError {
    #[display("store unavailable: {_0}")]
    Unavailable(String),
    #[display("listener disconnected")]
    Disconnected,
    #[display("document {_0} still contended after {_1} attempts")]
    Contention(DocumentPath, u32),
    #[display("corrupt document {_0}: {_1}")]
    Corrupt(DocumentPath, String),
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Snapshot>, StoreError>;

    /// Live view of one document. The first item is the state at subscribe
    /// time; later items follow commits. The stream ends after yielding an
    /// error when the listener connection is lost. Dropping it unregisters
    /// the listener.
    async fn subscribe_document(&self, path: &DocumentPath) -> Result<SnapshotStream, StoreError>;

    /// Writes `body` only if the stored version equals `expected`
    /// (`None` meaning the document must not exist yet).
    async fn write_if_version(
        &self,
        path: &DocumentPath,
        expected: Option<u64>,
        body: Document,
    ) -> Result<WriteOutcome, StoreError>;

    /// Clock used to stamp records at commit time.
    fn server_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
