//! Single-threaded deferred values.
//!
//! A [`Completion`] is the read side of a value that settles later; the
//! matching [`Resolver`] is the write side. Pipelines poll completions once
//! per frame instead of chaining callbacks, which keeps every step on the
//! thread that drives [`StageManager::update`](crate::stage::StageManager::update).
//!
//! The first settle wins. Dropping a [`Resolver`] that never settled rejects
//! its completion with [`Rejection::Cancelled`], so nothing waits forever on
//! an abandoned producer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Why a completion did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Explicitly cancelled, or the producer went away.
    Cancelled,
    /// The producer failed with a message.
    Failed(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Cancelled => write!(f, "cancelled"),
            Rejection::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Coarse state of a completion, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Pending,
    Resolved,
    Rejected,
}

enum Slot<T> {
    Pending,
    Resolved(Option<T>),
    Rejected(Rejection),
}

/// Read side of a deferred value.
pub struct Completion<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Write side of a deferred value.
pub struct Resolver<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("state", &self.state())
            .finish()
    }
}

impl<T> Completion<T> {
    /// Create a connected resolver/completion pair.
    pub fn pair() -> (Resolver<T>, Completion<T>) {
        let slot = Rc::new(RefCell::new(Slot::Pending));
        (
            Resolver {
                slot: Rc::clone(&slot),
            },
            Completion { slot },
        )
    }

    /// A completion that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Resolved(Some(value)))),
        }
    }

    /// A completion that is already rejected.
    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Rejected(rejection))),
        }
    }

    pub fn state(&self) -> CompletionState {
        match &*self.slot.borrow() {
            Slot::Pending => CompletionState::Pending,
            Slot::Resolved(_) => CompletionState::Resolved,
            Slot::Rejected(_) => CompletionState::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == CompletionState::Pending
    }

    /// Take the settled outcome.
    ///
    /// Returns `None` while pending. A resolved value is handed out once;
    /// later calls return `None`. A rejection is returned on every call.
    pub fn take(&self) -> Option<Result<T, Rejection>> {
        match &mut *self.slot.borrow_mut() {
            Slot::Pending => None,
            Slot::Resolved(value) => value.take().map(Ok),
            Slot::Rejected(rejection) => Some(Err(rejection.clone())),
        }
    }
}

impl<T> Resolver<T> {
    /// Resolve with `value`. Ignored if already settled.
    pub fn resolve(self, value: T) {
        self.settle(Slot::Resolved(Some(value)));
    }

    /// Reject with `rejection`. Ignored if already settled.
    pub fn reject(self, rejection: Rejection) {
        self.settle(Slot::Rejected(rejection));
    }

    pub fn is_settled(&self) -> bool {
        !matches!(&*self.slot.borrow(), Slot::Pending)
    }

    fn settle(&self, outcome: Slot<T>) {
        let mut slot = self.slot.borrow_mut();
        if matches!(&*slot, Slot::Pending) {
            *slot = outcome;
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        self.settle(Slot::Rejected(Rejection::Cancelled));
    }
}
