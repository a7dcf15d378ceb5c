//! Chain propagation errors.

use std::error::Error as StdError;
use thiserror::Error;

/// Error returned up a handler chain
#[derive(Error, Debug)]
pub enum ChainError {
    /// The call context was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// The call deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A handler failed on its own account
    #[error("{handler}: {source}")]
    Handler {
        /// Name of the failing handler
        handler: &'static str,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// An error from further down the chain with added context
    #[error("{context}: {source}")]
    Wrapped {
        /// What the wrapping handler was doing
        context: String,
        /// Error returned by the remainder
        #[source]
        source: Box<ChainError>,
    },
}

impl ChainError {
    /// Failure raised by `handler`
    pub fn handler<E>(handler: &'static str, err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        ChainError::Handler {
            handler,
            source: err.into(),
        }
    }

    /// Wrap this error with context, keeping it as the source
    pub fn wrap(self, context: impl Into<String>) -> Self {
        ChainError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost chain error, skipping every `Wrapped` layer
    pub fn root(&self) -> &ChainError {
        match self {
            ChainError::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }

    /// First error of type `E` in the source chain
    pub fn find<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<E>() {
                return Some(found);
            }
            current = err.source();
        }
        None
    }

    /// Whether the root cause is a cancelled or expired context
    pub fn is_context_error(&self) -> bool {
        matches!(
            self.root(),
            ChainError::Cancelled | ChainError::DeadlineExceeded
        )
    }
}
