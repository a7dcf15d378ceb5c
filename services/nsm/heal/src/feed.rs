//! Monitor feed: an open monitor stream bound to the context it lives in.

use crate::monitor::{ConnectionEventStream, MonitorConnectionClient, MonitorError};
use nsm_api::{ConnectionEvent, MonitorScopeSelector};
use nsm_core::Context;

/// Outcome of waiting on a [`MonitorFeed`]
#[derive(Debug)]
pub enum FeedItem {
    /// An event to apply
    Event(ConnectionEvent),
    /// A failed receive; nothing to apply, the next read may succeed
    Skip(MonitorError),
    /// The context was cancelled or the stream ended; stop reading
    Done,
}

/// Server-pushed connection events owned by a single consumer
pub struct MonitorFeed {
    ctx: Context,
    stream: Box<dyn ConnectionEventStream>,
}

impl MonitorFeed {
    /// Open the monitor stream for every visible connection under `ctx`
    pub async fn open(client: &dyn MonitorConnectionClient, ctx: Context) -> Result<Self, MonitorError> {
        let stream = client
            .monitor_connections(&ctx, &MonitorScopeSelector::default())
            .await?;
        Ok(Self { ctx, stream })
    }

    /// Context the feed lives in
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Wait for the next item
    pub async fn next(&mut self) -> FeedItem {
        if self.ctx.is_done() {
            return FeedItem::Done;
        }
        tokio::select! {
            biased;
            _ = self.ctx.done() => FeedItem::Done,
            received = self.stream.next_event() => match received {
                Ok(Some(event)) => FeedItem::Event(event),
                Ok(None) => FeedItem::Done,
                Err(err) => FeedItem::Skip(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::LocalMonitor;
    use nsm_api::Connection;

    #[tokio::test]
    async fn test_feed_distinguishes_skip_from_done() {
        let (monitor, sender) = LocalMonitor::channel();
        let (ctx, cancel) = Context::background().with_cancel();
        let mut feed = MonitorFeed::open(&monitor, ctx).await.unwrap();

        sender.send_error(MonitorError::Receive("transport reset".to_string()));
        sender.send(ConnectionEvent::delete(vec![Connection::new("a")]));

        assert!(matches!(feed.next().await, FeedItem::Skip(_)));
        assert!(matches!(feed.next().await, FeedItem::Event(_)));

        cancel.cancel();
        sender.send(ConnectionEvent::update(vec![Connection::new("b")]));
        assert!(matches!(feed.next().await, FeedItem::Done));
    }

    #[tokio::test]
    async fn test_feed_done_when_stream_ends() {
        let (monitor, sender) = LocalMonitor::channel();
        let mut feed = MonitorFeed::open(&monitor, Context::background())
            .await
            .unwrap();

        drop(sender);
        assert!(matches!(feed.next().await, FeedItem::Done));
    }

    #[tokio::test]
    async fn test_open_fails_on_cancelled_context() {
        let (monitor, _sender) = LocalMonitor::channel();
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let result = MonitorFeed::open(&monitor, ctx).await;
        assert!(matches!(result, Err(MonitorError::Context(_))));
    }
}
