//! Domain events
//!
//! Events are immutable facts. Every event carries `ts_event` (when it
//! happened) and `ts_init` (when the kernel created the object).

mod account;
mod order;
mod position;

pub use account::AccountState;
pub use order::{
    OrderAccepted, OrderCancelRejected, OrderCanceled, OrderDenied, OrderEventAny, OrderExpired,
    OrderFilled, OrderInitialized, OrderModifyRejected, OrderPendingCancel, OrderPendingUpdate,
    OrderRejected, OrderSubmitted, OrderTriggered, OrderUpdated, OrderWorking,
};
pub use position::{PositionEvent, PositionEventKind};
