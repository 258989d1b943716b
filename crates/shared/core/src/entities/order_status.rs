use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::events::OrderEventAny;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order has been created locally but not yet sent
    Initialized,
    /// Order was denied by the risk engine before reaching a venue
    Denied,
    /// Order has been sent to the venue
    Submitted,
    /// Order was acknowledged by the venue
    Accepted,
    /// Order is resting on the venue's book
    Working,
    /// Order was rejected by the venue
    Rejected,
    /// Order has been canceled
    Canceled,
    /// Order has expired (GTD/DAY)
    Expired,
    /// Stop order has been triggered
    Triggered,
    /// A modification request is in flight
    PendingUpdate,
    /// A cancel request is in flight
    PendingCancel,
    /// Order has been partially filled
    PartiallyFilled,
    /// Order has been completely filled
    Filled,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Denied
                | OrderStatus::Rejected
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Filled
        )
    }

    /// Returns true if the order is live at the venue and may still fill
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted
                | OrderStatus::Working
                | OrderStatus::Triggered
                | OrderStatus::PendingUpdate
                | OrderStatus::PendingCancel
                | OrderStatus::PartiallyFilled
        )
    }

    /// Returns true if the order has been sent but not yet acknowledged
    pub fn is_inflight(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::PendingUpdate | OrderStatus::PendingCancel
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::PendingUpdate | OrderStatus::PendingCancel)
    }

    /// Compute the next status for `event`.
    ///
    /// Fills always map to `Filled` here; the order downgrades to
    /// `PartiallyFilled` when leaves quantity remains. Rejections of modify or
    /// cancel requests and updates keep the current status; the order restores
    /// the pre-pending status itself.
    pub fn transition(&self, event: &OrderEventAny) -> Result<OrderStatus, OrderError> {
        use OrderEventAny as E;
        use OrderStatus as S;

        let next = match (self, event) {
            (S::Initialized, E::Denied(_)) => S::Denied,
            (S::Initialized, E::Submitted(_)) => S::Submitted,
            // External orders discovered through reconciliation
            (S::Initialized, E::Rejected(_)) => S::Rejected,
            (S::Initialized, E::Accepted(_)) => S::Accepted,
            (S::Initialized, E::Canceled(_)) => S::Canceled,
            (S::Initialized, E::Expired(_)) => S::Expired,
            (S::Initialized, E::Triggered(_)) => S::Triggered,

            (S::Submitted, E::PendingUpdate(_)) => S::PendingUpdate,
            (S::Submitted, E::PendingCancel(_)) => S::PendingCancel,
            (S::Submitted, E::Rejected(_)) => S::Rejected,
            // IOC and FOK remainders
            (S::Submitted, E::Canceled(_)) => S::Canceled,
            (S::Submitted, E::Accepted(_)) => S::Accepted,
            (S::Submitted, E::Filled(_)) => S::Filled,
            (S::Submitted, E::Updated(_)) => S::Submitted,
            (S::Submitted, E::ModifyRejected(_) | E::CancelRejected(_)) => S::Submitted,

            (S::Accepted, E::Working(_)) => S::Working,
            (S::Accepted, E::Rejected(_)) => S::Rejected,
            (S::Accepted, E::PendingUpdate(_)) => S::PendingUpdate,
            (S::Accepted, E::PendingCancel(_)) => S::PendingCancel,
            (S::Accepted, E::Canceled(_)) => S::Canceled,
            (S::Accepted, E::Triggered(_)) => S::Triggered,
            (S::Accepted, E::Expired(_)) => S::Expired,
            (S::Accepted, E::Filled(_)) => S::Filled,
            (S::Accepted, E::Updated(_)) => S::Accepted,
            (S::Accepted, E::ModifyRejected(_) | E::CancelRejected(_)) => S::Accepted,

            (S::Working, E::Rejected(_)) => S::Rejected,
            (S::Working, E::PendingUpdate(_)) => S::PendingUpdate,
            (S::Working, E::PendingCancel(_)) => S::PendingCancel,
            (S::Working, E::Canceled(_)) => S::Canceled,
            (S::Working, E::Triggered(_)) => S::Triggered,
            (S::Working, E::Expired(_)) => S::Expired,
            (S::Working, E::Filled(_)) => S::Filled,
            (S::Working, E::Updated(_)) => S::Working,
            (S::Working, E::ModifyRejected(_) | E::CancelRejected(_)) => S::Working,

            // A fill can race a cancel at the venue
            (S::Canceled, E::Filled(_)) => S::Filled,

            (S::PendingUpdate, E::Rejected(_)) => S::Rejected,
            (S::PendingUpdate, E::Accepted(_)) => S::Accepted,
            (S::PendingUpdate, E::Working(_)) => S::Working,
            (S::PendingUpdate, E::Canceled(_)) => S::Canceled,
            (S::PendingUpdate, E::Expired(_)) => S::Expired,
            (S::PendingUpdate, E::Triggered(_)) => S::Triggered,
            (S::PendingUpdate, E::PendingUpdate(_)) => S::PendingUpdate,
            (S::PendingUpdate, E::PendingCancel(_)) => S::PendingCancel,
            (S::PendingUpdate, E::Filled(_)) => S::Filled,
            (S::PendingUpdate, E::Updated(_) | E::ModifyRejected(_)) => S::PendingUpdate,

            (S::PendingCancel, E::Rejected(_)) => S::Rejected,
            (S::PendingCancel, E::PendingCancel(_)) => S::PendingCancel,
            (S::PendingCancel, E::Canceled(_)) => S::Canceled,
            (S::PendingCancel, E::Expired(_)) => S::Expired,
            (S::PendingCancel, E::Accepted(_)) => S::Accepted,
            (S::PendingCancel, E::Working(_)) => S::Working,
            (S::PendingCancel, E::Filled(_)) => S::Filled,
            (S::PendingCancel, E::CancelRejected(_)) => S::PendingCancel,

            (S::Triggered, E::Working(_)) => S::Triggered,
            (S::Triggered, E::Rejected(_)) => S::Rejected,
            (S::Triggered, E::PendingUpdate(_)) => S::PendingUpdate,
            (S::Triggered, E::PendingCancel(_)) => S::PendingCancel,
            (S::Triggered, E::Canceled(_)) => S::Canceled,
            (S::Triggered, E::Expired(_)) => S::Expired,
            (S::Triggered, E::Filled(_)) => S::Filled,
            (S::Triggered, E::Updated(_)) => S::Triggered,
            (S::Triggered, E::ModifyRejected(_) | E::CancelRejected(_)) => S::Triggered,

            (S::PartiallyFilled, E::PendingUpdate(_)) => S::PendingUpdate,
            (S::PartiallyFilled, E::PendingCancel(_)) => S::PendingCancel,
            (S::PartiallyFilled, E::Canceled(_)) => S::Canceled,
            (S::PartiallyFilled, E::Expired(_)) => S::Expired,
            (S::PartiallyFilled, E::Filled(_)) => S::Filled,
            (S::PartiallyFilled, E::Accepted(_)) => S::Accepted,
            (S::PartiallyFilled, E::Updated(_)) => S::PartiallyFilled,
            (S::PartiallyFilled, E::ModifyRejected(_) | E::CancelRejected(_)) => {
                S::PartiallyFilled
            }

            (status, event) => {
                return Err(OrderError::InvalidStateTransition {
                    status: *status,
                    event: event.kind(),
                });
            }
        };
        Ok(next)
    }
}
