//! Per-invocation context.
//!
//! Each tool call gets a fresh context: the caller's identity, a
//! correlation id, a deadline, and a cancellation signal. Contexts are
//! discarded once the caller consumes the result.

use crate::authz::CallerIdentity;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use trellis_odata::ServiceError;

/// A cooperative cancellation signal shared with the transport.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// A new, un-cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the invocation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a handler needs to know about one invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// The (pre-verified) caller identity.
    pub caller: CallerIdentity,

    /// Correlation id stamped into logs and the result envelope.
    pub correlation_id: String,

    /// Absolute deadline for the whole invocation.
    pub deadline: Option<Instant>,

    /// Cancellation signal checked before each outbound request.
    pub cancellation: CancellationFlag,
}

impl InvocationContext {
    /// A fresh context with a generated correlation id and no deadline.
    pub fn new(caller: CallerIdentity) -> Self {
        Self {
            caller,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Set the deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Use a caller-supplied correlation id instead of a generated one.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// The time budget left for the next outbound request.
    ///
    /// Fails with a timeout once the invocation is cancelled or past its
    /// deadline; `Ok(None)` means no deadline applies.
    pub fn remaining(&self) -> Result<Option<Duration>, ServiceError> {
        if self.cancellation.is_cancelled() {
            return Err(ServiceError::Timeout);
        }
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    Err(ServiceError::Timeout)
                } else {
                    Ok(Some(deadline - now))
                }
            }
        }
    }
}
