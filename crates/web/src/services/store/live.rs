//! Live queries on top of [`DocumentStore`].
//!
//! A live query re-runs its [`Query`] whenever the store reports a change to
//! the collection, or every poll interval for stores that cannot push
//! changes. The callback only fires when the result actually differs from
//! the previous one.
//!
//! The background task is owned by the returned [`Subscription`]; dropping it
//! unsubscribes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::{Document, DocumentStore, Query, StoreError};

/// Handle to a running live query. Dropping it stops the query.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a live query.
///
/// `seed` is a result the caller already holds (typically from an initial
/// blocking load); when present the callback is not invoked until the result
/// differs from it. Without a seed the query runs immediately.
pub fn subscribe<F>(
    store: Arc<dyn DocumentStore>,
    query: Query,
    poll_interval: Duration,
    seed: Option<Vec<Document>>,
    mut on_change: F,
) -> Subscription
where
    F: FnMut(Result<Vec<Document>, StoreError>) + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut changes = store.changes();
        let mut wait = seed.is_some();
        let mut last: Option<Result<Vec<Document>, String>> = seed.map(Ok);

        loop {
            if wait {
                wait_for_change(&mut changes, &query.collection, poll_interval).await;
            }
            wait = true;

            let result = store.query(&query).await;
            let current = match &result {
                Ok(docs) => Ok(docs.clone()),
                Err(e) => Err(e.to_string()),
            };
            if last.as_ref() == Some(&current) {
                continue;
            }
            if let Err(e) = &current {
                tracing::warn!(collection = %query.collection, error = %e, "Live query failed");
            }
            last = Some(current);
            on_change(result);
        }
    });
    Subscription { task }
}

/// Wait until `collection` changes or the poll interval elapses.
async fn wait_for_change(
    changes: &mut Option<broadcast::Receiver<String>>,
    collection: &str,
    poll_interval: Duration,
) {
    let sleep = tokio::time::sleep(poll_interval);
    tokio::pin!(sleep);

    loop {
        let Some(rx) = changes.as_mut() else {
            sleep.await;
            return;
        };
        let closed = tokio::select! {
            () = &mut sleep => return,
            msg = rx.recv() => match msg {
                Ok(c) if c == collection => return,
                Ok(_) => false,
                Err(RecvError::Lagged(_)) => return,
                Err(RecvError::Closed) => true,
            },
        };
        if closed {
            *changes = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::services::store::{Fields, MemoryStore};

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_unseeded_runs_immediately_then_follows_writes() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = subscribe(
            store.clone(),
            Query::collection("businesses"),
            Duration::from_secs(60),
            None,
            move |r| {
                let _ = tx.send(r.map(|d| d.len()).unwrap_or(usize::MAX));
            },
        );

        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(0));
        store.create_document("businesses", Fields::new()).await.unwrap();
        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_other_collections_do_not_fire() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = subscribe(
            store.clone(),
            Query::collection("customers"),
            Duration::from_secs(60),
            Some(Vec::new()),
            move |r| {
                let _ = tx.send(r.map(|d| d.len()).unwrap_or(usize::MAX));
            },
        );

        store.create_document("events", Fields::new()).await.unwrap();
        assert!(timeout(Duration::from_millis(200), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<usize>();
        let sub = subscribe(
            store.clone(),
            Query::collection("customers"),
            Duration::from_secs(60),
            Some(Vec::new()),
            move |r| {
                let _ = tx.send(r.map(|d| d.len()).unwrap_or(usize::MAX));
            },
        );
        drop(sub);

        // The aborted task drops the callback and with it the sender.
        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), None);
    }
}
