//! Self-healing chain client.
//!
//! The heal client sits in a handler chain. Every successful request leaves
//! behind a requestor (replays the request) and a closer (closes the returned
//! connection), both keyed by connection id. A background task reads the
//! connection monitor stream and hands each event to the serialized executor,
//! which folds it into the reported state and runs the requestor of every
//! tracked connection that is no longer reported.
//!
//! Repairs go to the configured heal target. Without one the client replays
//! the request through itself and the remainder of the chain captured when
//! the connection was first requested. That replay keeps the chain, and with
//! it the client, alive until [`HealClient::shutdown`] runs; a client that is
//! never shut down leaks its monitor task.

use crate::feed::{FeedItem, MonitorFeed};
use crate::monitor::MonitorConnectionClient;
use crate::state::{Action, HealState, TrackedState};
use async_trait::async_trait;
use nsm_api::{Connection, ConnectionEvent, NetworkServiceRequest};
use nsm_core::{ChainError, Context, Executor, Handler, NetworkService, Next, ScheduleError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Heal client tuning
#[derive(Debug, Clone)]
pub struct HealConfig {
    /// Repair budget for connections requested without a deadline
    pub default_heal_timeout: Duration,
    /// Pause after a failed receive before reading the monitor stream again
    pub recv_retry_interval: Duration,
    /// Close every still-tracked connection on shutdown
    pub close_on_shutdown: bool,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            default_heal_timeout: Duration::from_secs(15),
            recv_retry_interval: Duration::from_millis(100),
            close_on_shutdown: true,
        }
    }
}

/// Chain handler that re-requests connections the control plane lost
pub struct HealClient {
    inner: Arc<Inner>,
}

struct Inner {
    executor: Executor<HealState>,
    on_heal: Option<Arc<dyn NetworkService>>,
    config: HealConfig,
    monitor_cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl HealClient {
    /// Create the client and start consuming `monitor`.
    ///
    /// Repairs are sent to `on_heal`, or replayed through this client when it
    /// is `None`. Must be called inside a tokio runtime.
    pub fn new(
        monitor: Arc<dyn MonitorConnectionClient>,
        on_heal: Option<Arc<dyn NetworkService>>,
        config: HealConfig,
    ) -> Self {
        let executor = Executor::new("heal", HealState::default());
        let (ctx, monitor_cancel) = Context::background().with_cancel();

        tokio::spawn(consume_monitor(
            monitor,
            ctx,
            executor.clone(),
            config.recv_retry_interval,
        ));

        Self {
            inner: Arc::new(Inner {
                executor,
                on_heal,
                config,
                monitor_cancel,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Stop healing: cancel the monitor, close tracked connections if
    /// configured, and stop the executor. Only the first call has an effect.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Whether [`HealClient::shutdown`] was called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Number of tracked connections
    pub async fn tracked_count(&self) -> Result<usize, ScheduleError> {
        self.inner.executor.query(|state| state.tracked_count()).await
    }

    /// Where connection `id` stands, `None` when it is not tracked
    pub async fn tracked_state(&self, id: &str) -> Result<Option<TrackedState>, ScheduleError> {
        let id = id.to_string();
        self.inner
            .executor
            .query(move |state| state.tracked_state(&id))
            .await
    }

    /// Last reported copy of connection `id`
    pub async fn reported(&self, id: &str) -> Result<Option<Connection>, ScheduleError> {
        let id = id.to_string();
        self.inner
            .executor
            .query(move |state| state.reported(&id))
            .await
    }

    /// Number of connections in the reported state
    pub async fn reported_count(&self) -> Result<usize, ScheduleError> {
        self.inner.executor.query(|state| state.reported_count()).await
    }

    /// Wait until bookkeeping scheduled so far has been applied
    pub async fn flush(&self) -> Result<(), ScheduleError> {
        self.inner.executor.flush().await
    }
}

impl Drop for HealClient {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

#[async_trait]
impl Handler for HealClient {
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
        next: Next,
    ) -> Result<Connection, ChainError> {
        self.inner.request(ctx, request, next).await
    }

    async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError> {
        self.inner.close(ctx, conn, next).await
    }
}

impl Inner {
    async fn request(
        self: &Arc<Self>,
        ctx: &Context,
        request: &NetworkServiceRequest,
        next: Next,
    ) -> Result<Connection, ChainError> {
        let conn = next
            .clone()
            .request(ctx, request)
            .await
            .map_err(|err| err.wrap("error calling next"))?;
        self.register(ctx, request, &conn, next);
        Ok(conn)
    }

    async fn close(&self, ctx: &Context, conn: &Connection, next: Next) -> Result<(), ChainError> {
        next.close(ctx, conn)
            .await
            .map_err(|err| err.wrap("error calling next"))?;

        let id = conn.id.clone();
        if let Err(err) = self.executor.schedule(move |state| {
            if state.unregister(&id) {
                debug!("Connection {} closed, no longer healed", id);
            }
        }) {
            debug!("Not unregistering connection {}: {}", conn.id, err);
        }
        Ok(())
    }

    fn register(
        self: &Arc<Self>,
        ctx: &Context,
        request: &NetworkServiceRequest,
        conn: &Connection,
        next: Next,
    ) {
        let request = request.with_connection(conn.clone());
        let budget = ctx
            .remaining()
            .unwrap_or(self.config.default_heal_timeout);
        let target: Arc<dyn NetworkService> = match &self.on_heal {
            Some(target) => target.clone(),
            None => Arc::new(Replay {
                inner: Arc::downgrade(self),
                next,
            }),
        };

        let requestor = repair_action(ctx.clone(), budget, request, target.clone());
        let closer = close_action(ctx.clone(), budget, conn.clone(), target);
        let id = conn.id.clone();
        if let Err(err) = self.executor.schedule(move |state| {
            debug!("Tracking connection {}", id);
            state.register(id, requestor, closer);
        }) {
            warn!("Connection {} will not be healed: {}", conn.id, err);
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancel = self.monitor_cancel.clone();
        let close_tracked = self.config.close_on_shutdown;
        let scheduled = self.executor.schedule(move |state| {
            cancel.cancel();
            let closers = state.clear();
            if close_tracked {
                info!("Heal client shutting down, closing {} tracked connections", closers.len());
                for closer in closers {
                    closer();
                }
            }
        });
        if scheduled.is_err() {
            self.monitor_cancel.cancel();
        }
        self.executor.shutdown();
    }
}

/// Heal target replaying through the heal client and the captured remainder
struct Replay {
    inner: Weak<Inner>,
    next: Next,
}

impl Replay {
    fn inner(&self) -> Result<Arc<Inner>, ChainError> {
        self.inner
            .upgrade()
            .ok_or_else(|| ChainError::handler("heal", anyhow::anyhow!("heal client dropped")))
    }
}

#[async_trait]
impl NetworkService for Replay {
    async fn request(
        &self,
        ctx: &Context,
        request: &NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        self.inner()?.request(ctx, request, self.next.clone()).await
    }

    async fn close(&self, ctx: &Context, conn: &Connection) -> Result<(), ChainError> {
        self.inner()?.close(ctx, conn, self.next.clone()).await
    }
}

fn repair_action(
    origin: Context,
    budget: Duration,
    request: NetworkServiceRequest,
    target: Arc<dyn NetworkService>,
) -> Action {
    Arc::new(move || {
        let ctx = origin.detached(budget);
        let request = request.clone();
        let target = target.clone();
        tokio::spawn(async move {
            let id = request.connection_id().to_string();
            match target.request(&ctx, &request).await {
                Ok(conn) => info!("Healed connection {} (now {})", id, conn.id),
                Err(err) => warn!("Failed to heal connection {}: {}", id, err),
            }
        });
    })
}

fn close_action(
    origin: Context,
    budget: Duration,
    conn: Connection,
    target: Arc<dyn NetworkService>,
) -> Action {
    Arc::new(move || {
        let ctx = origin.detached(budget);
        let conn = conn.clone();
        let target = target.clone();
        tokio::spawn(async move {
            match target.close(&ctx, &conn).await {
                Ok(()) => info!("Closed connection {}", conn.id),
                Err(err) => warn!("Failed to close connection {}: {}", conn.id, err),
            }
        });
    })
}

async fn consume_monitor(
    monitor: Arc<dyn MonitorConnectionClient>,
    ctx: Context,
    executor: Executor<HealState>,
    retry_interval: Duration,
) {
    let mut feed = match MonitorFeed::open(monitor.as_ref(), ctx).await {
        Ok(feed) => feed,
        Err(err) => {
            error!("Failed to open connection monitor, healing disabled: {}", err);
            return;
        }
    };
    info!("Connection monitor opened");

    loop {
        match feed.next().await {
            FeedItem::Event(event) => {
                if let Err(err) = executor.schedule(move |state| apply_event(state, event)) {
                    debug!("Dropping monitor event: {}", err);
                    break;
                }
            }
            FeedItem::Skip(err) => {
                warn!("Connection monitor receive failed: {}", err);
                if feed.context().run(tokio::time::sleep(retry_interval)).await.is_err() {
                    break;
                }
            }
            FeedItem::Done => break,
        }
    }
    info!("Connection monitor closed, healing stopped");
}

fn apply_event(state: &mut HealState, event: ConnectionEvent) {
    debug!(
        "Applying event of type {} with {} connections",
        event.r#type,
        event.connections.len()
    );
    let healed = state.apply_and_heal(event);
    if healed > 0 {
        info!("Healing {} connections", healed);
    }
}
