use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::store::{Document, DocumentPath, DocumentStore, StoreError, WriteOutcome};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const BASE_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Atomic read-modify-write of a single document.
///
/// `f` receives the current body (`None` if absent) and the server time of
/// this attempt, and returns the replacement body plus a value handed back to
/// the caller. An `Err` from `f` aborts without writing. If another writer
/// commits between the read and the conditional write, the whole sequence runs
/// again, at most `max_attempts` times in total.
pub async fn run_transaction<S, F, T, E>(
    store: &S,
    path: &DocumentPath,
    max_attempts: u32,
    mut f: F,
) -> Result<T, E>
where
    S: DocumentStore + ?Sized,
    F: FnMut(Option<&Document>, DateTime<Utc>) -> Result<(Document, T), E>,
    E: From<StoreError>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let current = store.get_document(path).await?;
        let (body, output) = f(current.as_ref().map(|s| &s.body), store.server_time())?;

        match store
            .write_if_version(path, current.map(|s| s.version), body)
            .await?
        {
            WriteOutcome::Committed(version) => {
                debug!("Committed {} at version {} (attempt {})", path, version, attempt);
                return Ok(output);
            }
            WriteOutcome::Conflict => {
                debug!("Write conflict on {} (attempt {})", path, attempt);
                if attempt < max_attempts {
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }
    }

    warn!("Giving up on {} after {} attempts", path, max_attempts);
    Err(StoreError::Contention(path.clone(), max_attempts).into())
}

fn backoff(attempt: u32) -> Duration {
    BASE_BACKOFF
        .saturating_mul(1 << attempt.min(6))
        .min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn counter_path() -> DocumentPath {
        DocumentPath::new("counters", "c-1")
    }

    async fn increment(store: &MemoryStore, attempts: u32) -> Result<i64, StoreError> {
        run_transaction(store, &counter_path(), attempts, |doc, _| {
            let next = doc.and_then(|d| d["n"].as_i64()).unwrap_or(0) + 1;
            Ok::<_, StoreError>((json!({ "n": next }), next))
        })
        .await
    }

    #[tokio::test]
    async fn creates_missing_document() {
        let store = MemoryStore::new();

        assert_eq!(increment(&store, 3).await, Ok(1));
        assert_eq!(increment(&store, 3).await, Ok(2));

        let snapshot = store.get_document(&counter_path()).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.body, json!({ "n": 2 }));
    }

    #[tokio::test]
    async fn retries_after_conflict() {
        let store = MemoryStore::new();
        store.inject_conflicts(2);

        assert_eq!(increment(&store, 3).await, Ok(1));
        assert_eq!(store.committed_writes(), 1);
    }

    #[tokio::test]
    async fn gives_up_when_contended() {
        let store = MemoryStore::new();
        store.inject_conflicts(3);

        assert_eq!(
            increment(&store, 3).await,
            Err(StoreError::Contention(counter_path(), 3))
        );
        assert_eq!(store.committed_writes(), 0);
        assert_eq!(store.get_document(&counter_path()).await, Ok(None));
    }

    #[tokio::test]
    async fn aborted_closure_writes_nothing() {
        let store = MemoryStore::new();

        let result: Result<(), StoreError> =
            run_transaction(&store, &counter_path(), 3, |_, _| {
                Err(StoreError::Unavailable("rejected".to_owned()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.committed_writes(), 0);
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(1), Duration::from_millis(4));
        assert_eq!(backoff(30), MAX_BACKOFF);
    }
}
