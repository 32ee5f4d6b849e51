// ChangeFeed - per-user view of the store's change broadcast

use futures::{Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use super::StoreChange;

/// Subscription to one user's store changes
///
/// Dropping the feed (or calling `unsubscribe`) releases the underlying
/// broadcast receiver.
pub struct ChangeFeed {
    user_id: String,
    rx: Option<broadcast::Receiver<StoreChange>>,
}

impl ChangeFeed {
    pub(crate) fn new(user_id: &str, rx: broadcast::Receiver<StoreChange>) -> Self {
        Self {
            user_id: user_id.to_string(),
            rx: Some(rx),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_subscribed(&self) -> bool {
        self.rx.is_some()
    }

    /// Wait for the next change for this user. `None` once unsubscribed or
    /// the store is gone.
    pub async fn next(&mut self) -> Option<StoreChange> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(change) if change.user_id() == self.user_id => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "[ChangeFeed] Subscriber for {} lagged, {} changes skipped",
                        self.user_id,
                        skipped
                    );
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Next already-delivered change, without waiting
    pub fn try_next(&mut self) -> Option<StoreChange> {
        loop {
            let rx = self.rx.as_mut()?;
            match rx.try_recv() {
                Ok(change) if change.user_id() == self.user_id => return Some(change),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!(
                        "[ChangeFeed] Subscriber for {} lagged, {} changes skipped",
                        self.user_id,
                        skipped
                    );
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            log::debug!("[ChangeFeed] Unsubscribed {}", self.user_id);
        }
    }

    /// Consume the feed as a `Stream`; lagged gaps are skipped
    pub fn into_stream(self) -> impl Stream<Item = StoreChange> + Send + 'static {
        let user_id = self.user_id;
        let stream = match self.rx {
            Some(rx) => BroadcastStream::new(rx).left_stream(),
            None => futures::stream::empty::<Result<StoreChange, BroadcastStreamRecvError>>()
                .right_stream(),
        };
        stream.filter_map(move |item| {
            let change = item.ok().filter(|change| change.user_id() == user_id);
            futures::future::ready(change)
        })
    }
}
