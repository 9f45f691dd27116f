use std::{
    collections::HashMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::store::{
    Document, DocumentPath, DocumentStore, Snapshot, SnapshotStream, StoreError, WriteOutcome,
    listeners::Listeners,
};

/// In-process document store.
///
/// Behaves like a remote store with respect to versioning and listeners, and
/// lets tests inject latency, write conflicts, outages and dropped listener
/// connections.
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentPath, Snapshot>>,
    listeners: Listeners,
    faults: Mutex<Faults>,
    read_latency: Option<Duration>,
    committed_writes: AtomicU64,
}

#[derive(Default)]
struct Faults {
    conflicts: u32,
    outages: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            documents: Mutex::new(HashMap::new()),
            listeners: Listeners::new(),
            faults: Mutex::new(Faults::default()),
            read_latency: None,
            committed_writes: AtomicU64::new(0),
        }
    }

    /// Delays every read, widening the window between read and write.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// The next `n` conditional writes report a conflict without writing.
    pub fn inject_conflicts(&self, n: u32) {
        self.faults().conflicts = n;
    }

    /// The next `n` store calls fail as unavailable.
    pub fn inject_outages(&self, n: u32) {
        self.faults().outages = n;
    }

    pub fn sever_listeners(&self) {
        self.listeners.sever();
    }

    pub fn listener_count(&self, path: &DocumentPath) -> usize {
        self.listeners.listener_count(path)
    }

    pub fn committed_writes(&self) -> u64 {
        self.committed_writes.load(Ordering::SeqCst)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn documents(&self) -> std::sync::MutexGuard<'_, HashMap<DocumentPath, Snapshot>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_available(&self) -> Result<(), StoreError> {
        let mut faults = self.faults();
        if faults.outages > 0 {
            faults.outages -= 1;
            return Err(StoreError::Unavailable("injected outage".to_owned()));
        }

        Ok(())
    }

    fn take_conflict(&self) -> bool {
        let mut faults = self.faults();
        if faults.conflicts > 0 {
            faults.conflicts -= 1;
            return true;
        }

        false
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Snapshot>, StoreError> {
        self.require_available()?;

        let snapshot = self.documents().get(path).cloned();

        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }

        Ok(snapshot)
    }

    async fn subscribe_document(&self, path: &DocumentPath) -> Result<SnapshotStream, StoreError> {
        self.require_available()?;

        let updates = self.listeners.subscribe(path);
        let current = self.documents().get(path).cloned();
        if let Some(current) = current {
            self.listeners.publish(path, current);
        }

        Ok(updates)
    }

    async fn write_if_version(
        &self,
        path: &DocumentPath,
        expected: Option<u64>,
        body: Document,
    ) -> Result<WriteOutcome, StoreError> {
        self.require_available()?;

        if self.take_conflict() {
            return Ok(WriteOutcome::Conflict);
        }

        let snapshot = {
            let mut documents = self.documents();
            let stored = documents.get(path).map(|s| s.version);
            if stored != expected {
                return Ok(WriteOutcome::Conflict);
            }

            let snapshot = Snapshot {
                version: expected.map_or(1, |v| v + 1),
                body,
            };
            documents.insert(path.clone(), snapshot.clone());
            snapshot
        };

        self.committed_writes.fetch_add(1, Ordering::SeqCst);
        let version = snapshot.version;
        self.listeners.publish(path, snapshot);

        Ok(WriteOutcome::Committed(version))
    }
}
