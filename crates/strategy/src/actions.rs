use chrono::Duration;
use tessera_core::data::DataType;
use tessera_core::{ClientOrderId, InstrumentId, Order, PositionId, Price, Quantity, Side, Timestamp};

/// Actions a strategy can request
///
/// Handlers return actions instead of calling into the engines directly, so a
/// strategy never holds a borrow of shared state while commands are routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start streaming a data type to this strategy
    Subscribe(DataType),
    Unsubscribe(DataType),
    /// Ask for history; the answer arrives in `on_data_response`
    Request {
        data_type: DataType,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        limit: Option<usize>,
    },
    /// Submit an order built with the context's order factory
    SubmitOrder {
        order: Order,
        position_id: Option<PositionId>,
    },
    ModifyOrder {
        client_order_id: ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    },
    CancelOrder { client_order_id: ClientOrderId },
    /// Cancel every open order of the strategy for an instrument (optionally one side)
    CancelAllOrders {
        instrument_id: InstrumentId,
        side: Option<Side>,
    },
    /// Flatten the strategy's net position with a reduce-only market order
    ClosePosition { instrument_id: InstrumentId },
    SetTimer {
        name: String,
        interval: Duration,
        start: Option<Timestamp>,
        stop: Option<Timestamp>,
    },
    SetTimeAlert { name: String, alert_time: Timestamp },
    CancelTimer { name: String },
}

impl Action {
    pub fn submit(order: Order) -> Self {
        Action::SubmitOrder {
            order,
            position_id: None,
        }
    }

    pub fn cancel(client_order_id: ClientOrderId) -> Self {
        Action::CancelOrder { client_order_id }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Subscribe(_) => "Subscribe",
            Action::Unsubscribe(_) => "Unsubscribe",
            Action::Request { .. } => "Request",
            Action::SubmitOrder { .. } => "SubmitOrder",
            Action::ModifyOrder { .. } => "ModifyOrder",
            Action::CancelOrder { .. } => "CancelOrder",
            Action::CancelAllOrders { .. } => "CancelAllOrders",
            Action::ClosePosition { .. } => "ClosePosition",
            Action::SetTimer { .. } => "SetTimer",
            Action::SetTimeAlert { .. } => "SetTimeAlert",
            Action::CancelTimer { .. } => "CancelTimer",
        }
    }
}
