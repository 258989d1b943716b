//! Commands: immutable instructions flowing strategy -> risk -> engines -> clients

mod data;
mod trading;

pub use data::{DataCommand, DataPayload, DataResponse, RequestData, SubscribeData};
pub use trading::{CancelAllOrders, CancelOrder, ModifyOrder, SubmitOrder, TradingCommand};
