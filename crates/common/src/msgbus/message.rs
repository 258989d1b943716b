use serde::{Deserialize, Serialize};
use tessera_core::commands::{DataCommand, DataResponse, TradingCommand};
use tessera_core::data::Data;
use tessera_core::events::{AccountState, OrderEventAny, PositionEvent};
use tessera_ports::TimeEvent;

/// Everything that travels over the [`crate::MessageBus`]
///
/// Closed so that handlers match exhaustively instead of inspecting types at
/// runtime. `Custom` carries user payloads that the kernel never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Data(Data),
    OrderEvent(OrderEventAny),
    PositionEvent(PositionEvent),
    AccountState(AccountState),
    TradingCommand(TradingCommand),
    DataCommand(DataCommand),
    DataResponse(DataResponse),
    Time(TimeEvent),
    Custom(serde_json::Value),
}

impl Message {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Data(_) => "Data",
            Message::OrderEvent(e) => e.kind(),
            Message::PositionEvent(_) => "PositionEvent",
            Message::AccountState(_) => "AccountState",
            Message::TradingCommand(c) => c.kind(),
            Message::DataCommand(_) => "DataCommand",
            Message::DataResponse(_) => "DataResponse",
            Message::Time(_) => "TimeEvent",
            Message::Custom(_) => "Custom",
        }
    }

    /// True for messages that belong in an emitted event log
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            Message::OrderEvent(_) | Message::PositionEvent(_) | Message::AccountState(_)
        )
    }
}

impl From<Data> for Message {
    fn from(value: Data) -> Self {
        Message::Data(value)
    }
}

impl From<OrderEventAny> for Message {
    fn from(value: OrderEventAny) -> Self {
        Message::OrderEvent(value)
    }
}

impl From<PositionEvent> for Message {
    fn from(value: PositionEvent) -> Self {
        Message::PositionEvent(value)
    }
}

impl From<AccountState> for Message {
    fn from(value: AccountState) -> Self {
        Message::AccountState(value)
    }
}

impl From<TradingCommand> for Message {
    fn from(value: TradingCommand) -> Self {
        Message::TradingCommand(value)
    }
}

impl From<DataCommand> for Message {
    fn from(value: DataCommand) -> Self {
        Message::DataCommand(value)
    }
}

impl From<DataResponse> for Message {
    fn from(value: DataResponse) -> Self {
        Message::DataResponse(value)
    }
}
