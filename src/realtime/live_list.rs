//! A list view that keeps itself current.
//!
//! The list loads once, then reloads whenever one of its event kinds is
//! emitted. Events that arrive while a load is running are folded into a
//! single follow-up load. Dropping the view stops everything: listeners
//! are removed, an in-flight load is abandoned and its result is never
//! published.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::gateway::Freshness;
use crate::error::ApiError;
use crate::events::{EventBus, EventKind, Subscription};

pub type Fetcher<T> =
    Arc<dyn Fn(Freshness) -> BoxFuture<'static, Result<Vec<T>, ApiError>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    /// Last load error. Items from the previous successful load are kept.
    pub error: Option<ApiError>,
    /// Successful loads so far.
    pub refreshed: u64,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            refreshed: 0,
        }
    }
}

pub struct LiveList<T> {
    state: watch::Receiver<ListState<T>>,
    cancel: CancellationToken,
    subscriptions: Vec<Subscription>,
    task: Option<JoinHandle<()>>,
}

impl<T> LiveList<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts the view. Must be called inside a tokio runtime.
    pub fn spawn<F>(bus: &EventBus, kinds: &[EventKind], fetch: F) -> Self
    where
        F: Fn(Freshness) -> BoxFuture<'static, Result<Vec<T>, ApiError>> + Send + Sync + 'static,
    {
        let (notify, events) = mpsc::unbounded_channel();
        let subscriptions = kinds
            .iter()
            .map(|&kind| {
                let notify = notify.clone();
                bus.on(kind, move |event| {
                    let freshness = if event.invalidates_cache() {
                        Freshness::Bypass
                    } else {
                        Freshness::Cached
                    };
                    let _ = notify.send(freshness);
                })
            })
            .collect();
        drop(notify);

        let (publish, state) = watch::channel(ListState::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(reload_loop(
            Arc::new(fetch),
            events,
            publish,
            cancel.clone(),
        ));

        Self {
            state,
            cancel,
            subscriptions,
            task: Some(task),
        }
    }

    pub fn snapshot(&self) -> ListState<T> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn watch(&self) -> watch::Receiver<ListState<T>> {
        self.state.clone()
    }

    /// Waits until `ready` holds for the published state.
    pub async fn wait_for<P>(&self, mut ready: P) -> Option<ListState<T>>
    where
        P: FnMut(&ListState<T>) -> bool,
    {
        let mut rx = self.state.clone();
        rx.wait_for(|state| ready(state))
            .await
            .ok()
            .map(|state| state.clone())
    }

    /// Stops the view and waits for its task to finish.
    pub async fn close(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<T> LiveList<T> {
    fn shutdown(&mut self) {
        self.subscriptions.clear();
        self.cancel.cancel();
    }
}

impl<T> Drop for LiveList<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn reload_loop<T>(
    fetch: Fetcher<T>,
    mut events: mpsc::UnboundedReceiver<Freshness>,
    publish: watch::Sender<ListState<T>>,
    cancel: CancellationToken,
) {
    let mut next = Some(Freshness::Cached);

    loop {
        let mut freshness = match next.take() {
            Some(freshness) => freshness,
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Some(freshness) => freshness,
                    None => break,
                },
            },
        };
        // Fold a burst into one load; any bypass wins.
        while let Ok(more) = events.try_recv() {
            if more == Freshness::Bypass {
                freshness = Freshness::Bypass;
            }
        }

        trace!(?freshness, "Reloading list");
        publish.send_modify(|state| state.loading = true);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = fetch(freshness) => result,
        };
        if cancel.is_cancelled() {
            break;
        }

        publish.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(items) => {
                    state.items = items;
                    state.error = None;
                    state.refreshed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "List reload failed");
                    state.error = Some(e);
                }
            }
        });
    }
    debug!("Live list stopped");
}
