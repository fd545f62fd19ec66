//! Actionable-order state machine, shared by nursing and lab orders.
//!
//! ```text
//! pending ──started──▶ in_progress ──completed──▶ completed
//!    │                    │  ▲ paused/resumed
//!    ├────completed───────┼──┘
//!    └────cancelled───────┴──────────────────────▶ cancelled
//! ```
//!
//! The event log is authoritative; the stored status is the result of
//! replaying it.

use thiserror::Error;

use crate::models::enums::{ExecutionAction, OrderStatus};
use crate::models::ExecutionEvent;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot apply '{action}' to an order that is {from}")]
    NotAllowed {
        from: OrderStatus,
        action: ExecutionAction,
    },

    #[error("Order changed concurrently; reload and retry")]
    Conflict,
}

pub fn is_terminal(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Completed | OrderStatus::Cancelled)
}

/// Status reached by applying `action` in `from`.
pub fn next_status(from: OrderStatus, action: ExecutionAction) -> Result<OrderStatus, TransitionError> {
    use ExecutionAction as A;
    use OrderStatus as S;

    let next = match (from, action) {
        (S::Pending, A::Started) => S::InProgress,
        (S::InProgress, A::Paused | A::Resumed) => S::InProgress,
        (S::Pending | S::InProgress, A::Completed) => S::Completed,
        (S::Pending | S::InProgress, A::Cancelled) => S::Cancelled,
        _ => return Err(TransitionError::NotAllowed { from, action }),
    };
    Ok(next)
}

/// Replay an event log from `pending`.
pub fn replay(events: &[ExecutionEvent]) -> Result<OrderStatus, TransitionError> {
    events
        .iter()
        .try_fold(OrderStatus::Pending, |status, event| next_status(status, event.action))
}
