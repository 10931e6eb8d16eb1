//! Bounded per-row lookups.
//!
//! List screens that need one extra call per row go through `fetch_bounded`, which caps
//! how many calls are in flight and abandons the batch as soon as the owning view goes
//! away.

use futures::{StreamExt, stream};
use std::{future::Future, sync::Arc};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the batch was cancelled")]
pub struct Cancelled;

/// Cancellation
///
/// A cloneable token. Once cancelled it stays cancelled.
#[derive(Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// A token plus a guard that cancels it when dropped. Hold the guard for as long as
    /// the view that started the work is alive.
    pub fn scoped() -> (Self, CancelOnDrop) {
        let token = Self::new();
        let guard = CancelOnDrop(token.clone());
        (token, guard)
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so this only returns once the flag flips.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// CancelOnDrop
///
/// Cancels its token when it goes out of scope.
pub struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// fetch_bounded
///
/// Runs `f` over every item with at most `limit` futures in flight at once and returns
/// the outputs in input order. Fails with `Cancelled` if the token fires first; any
/// calls still running are dropped.
pub async fn fetch_bounded<I, T, F, Fut>(
    items: I,
    limit: usize,
    cancel: &Cancellation,
    mut f: F,
) -> Result<Vec<T>, Cancelled>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }

    let calls = items.into_iter().enumerate().map(|(index, item)| {
        let call = f(item);
        async move { (index, call.await) }
    });

    let work = stream::iter(calls)
        .buffer_unordered(limit.max(1))
        .collect::<Vec<_>>();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        mut results = work => {
            results.sort_by_key(|(index, _)| *index);
            Ok(results.into_iter().map(|(_, output)| output).collect())
        }
    }
}
