//! Call context carried through a handler chain.
//!
//! A [`Context`] carries a deadline, a cancellation token and typed
//! side-channel values that handlers inject for handlers further down the
//! chain (for example accumulated dataplane configuration). Contexts are
//! cheap to clone and immutable: `with_*` methods return a derived context.

use crate::error::ChainError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Values = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Deadline, cancellation and side-channel values of a call
#[derive(Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
    values: Arc<Values>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("cancelled", &self.token.is_cancelled())
            .field("values", &self.values.len())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// Root context: no deadline, never cancelled unless a child token is
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
            values: Arc::new(HashMap::new()),
        }
    }

    /// Derived context expiring after `timeout`, or earlier if the parent does
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derived context expiring at `deadline`, or earlier if the parent does
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
            values: self.values.clone(),
        }
    }

    /// Derived context plus the token that cancels it (and only it)
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.token.child_token();
        let ctx = Self {
            deadline: self.deadline,
            token: token.clone(),
            values: self.values.clone(),
        };
        (ctx, token)
    }

    /// Derived context carrying `value`, replacing any previous value of type `T`
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            deadline: self.deadline,
            token: self.token.clone(),
            values: Arc::new(values),
        }
    }

    /// Value of type `T` injected by this context or one of its parents
    pub fn value<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Fresh root context expiring after `budget` that keeps this context's
    /// values but not its deadline or cancellation
    pub fn detached(&self, budget: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + budget),
            token: CancellationToken::new(),
            values: self.values.clone(),
        }
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once elapsed, `None` without one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancellation token of this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Why this context is done, or `None` while it is live
    pub fn err(&self) -> Option<ChainError> {
        if self.token.is_cancelled() {
            return Some(ChainError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ChainError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the context is cancelled or expired
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or expired
    pub async fn done(&self) -> ChainError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => ChainError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ChainError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ChainError::Cancelled
            }
        }
    }

    /// Drive `fut` until it completes or the context is done
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = T>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[tokio::test(start_paused = true)]
    async fn test_timeout_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(child.err(), Some(ChainError::DeadlineExceeded)));
        assert_eq!(child.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children_only() {
        let root = Context::background();
        let (ctx, cancel) = root.with_cancel();
        let child = ctx.with_value(Tenant("blue"));

        cancel.cancel();
        assert!(matches!(child.err(), Some(ChainError::Cancelled)));
        assert!(root.err().is_none());
    }

    #[test]
    fn test_values_are_layered() {
        let base = Context::background().with_value(Tenant("blue"));
        let over = base.with_value(Tenant("red")).with_value(7u32);

        assert_eq!(*base.value::<Tenant>().unwrap(), Tenant("blue"));
        assert_eq!(*over.value::<Tenant>().unwrap(), Tenant("red"));
        assert_eq!(*over.value::<u32>().unwrap(), 7);
        assert!(base.value::<u32>().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_keeps_values_with_new_budget() {
        let (ctx, cancel) = Context::background().with_value(Tenant("blue")).with_cancel();
        cancel.cancel();

        let detached = ctx.detached(Duration::from_secs(3));
        assert!(detached.err().is_none());
        assert_eq!(*detached.value::<Tenant>().unwrap(), Tenant("blue"));
        assert_eq!(detached.remaining(), Some(Duration::from_secs(3)));

        let zero = ctx.detached(Duration::ZERO);
        assert!(matches!(zero.err(), Some(ChainError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(result, Err(ChainError::DeadlineExceeded)));

        let ok = Context::background().run(async { 5 }).await.unwrap();
        assert_eq!(ok, 5);
    }
}
