//! Table change notifications and live queries
//!
//! Every write through the repository publishes the tables it touched.
//! A [`Subscription`] holds the latest result of a query and recomputes it
//! whenever one of the tables it reads from changes. Dropping the
//! subscription stops its background task.

use crate::config::CHANGE_BUS_CAPACITY;
use std::future::Future;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Tables a live query can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Diaries,
    Images,
    Tags,
    DiaryTags,
}

/// Fan-out of table change events
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<&'static [Table]>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self { tx }
    }

    /// Publish a committed write. Having no listeners is not an error.
    pub fn notify(&self, tables: &'static [Table]) {
        let _ = self.tx.send(tables);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<&'static [Table]> {
        self.tx.subscribe()
    }

    /// Start a live query.
    ///
    /// The initial snapshot is computed before this returns. Listening starts
    /// before that first run, so writes racing with it are never missed.
    pub async fn watch<T, F, Fut, E>(&self, tables: &'static [Table], query: F) -> Result<Subscription<T>, E>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let mut events = self.subscribe();
        let initial = query().await?;
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(changed) if !changed.iter().any(|t| tables.contains(t)) => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Live query lagged by {} events, recomputing", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                match query().await {
                    Ok(value) => {
                        if tx.send(value).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Live query refresh failed: {}", e),
                }
            }
        });

        Ok(Subscription { rx, task })
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a live query result
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Clone> Subscription<T> {
    /// Latest snapshot
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot. Returns `None` once the query has stopped.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recomputes_on_matching_table() {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(0));

        let source = counter.clone();
        let mut sub = bus
            .watch(&[Table::Diaries], move || {
                let source = source.clone();
                async move { Ok::<_, String>(source.load(Ordering::SeqCst)) }
            })
            .await
            .unwrap();

        assert_eq!(sub.current(), 0);

        counter.store(5, Ordering::SeqCst);
        bus.notify(&[Table::Diaries]);

        let next = tokio::time::timeout(Duration::from_secs(2), sub.changed())
            .await
            .unwrap();
        assert_eq!(next, Some(5));
    }

    #[tokio::test]
    async fn test_ignores_unrelated_tables() {
        let bus = ChangeBus::new();
        let counter = Arc::new(AtomicI64::new(0));

        let source = counter.clone();
        let mut sub = bus
            .watch(&[Table::Tags], move || {
                let source = source.clone();
                async move { Ok::<_, String>(source.load(Ordering::SeqCst)) }
            })
            .await
            .unwrap();

        counter.store(9, Ordering::SeqCst);
        bus.notify(&[Table::Images]);

        let next = tokio::time::timeout(Duration::from_millis(200), sub.changed()).await;
        assert!(next.is_err(), "unrelated change should not refresh the query");
        assert_eq!(sub.current(), 0);
    }

    #[tokio::test]
    async fn test_initial_error_is_returned() {
        let bus = ChangeBus::new();

        let result = bus
            .watch(&[Table::Diaries], || async { Err::<i64, _>("boom".to_string()) })
            .await;

        assert!(result.is_err());
    }
}
