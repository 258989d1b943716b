use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::{Bar, DataType, OrderBookDepth, QuoteTick, TradeTick};
use crate::identifiers::{ClientId, Venue};
use crate::instruments::Instrument;
use crate::values::Timestamp;

/// Start (or stop) streaming a data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeData {
    pub client_id: Option<ClientId>,
    pub venue: Option<Venue>,
    pub data_type: DataType,
    pub command_id: Uuid,
    pub ts_init: Timestamp,
}

/// Historical data request answered through the bus correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub client_id: Option<ClientId>,
    pub venue: Option<Venue>,
    pub data_type: DataType,
    /// Defaults to now when omitted
    pub start: Option<Timestamp>,
    /// Defaults to now when omitted
    pub end: Option<Timestamp>,
    pub limit: Option<usize>,
    pub request_id: Uuid,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataCommand {
    Subscribe(SubscribeData),
    Unsubscribe(SubscribeData),
    Request(RequestData),
}

impl DataCommand {
    pub fn data_type(&self) -> &DataType {
        match self {
            DataCommand::Subscribe(c) | DataCommand::Unsubscribe(c) => &c.data_type,
            DataCommand::Request(r) => &r.data_type,
        }
    }

    pub fn client_id(&self) -> Option<&ClientId> {
        match self {
            DataCommand::Subscribe(c) | DataCommand::Unsubscribe(c) => c.client_id.as_ref(),
            DataCommand::Request(r) => r.client_id.as_ref(),
        }
    }

    pub fn venue(&self) -> Option<&Venue> {
        match self {
            DataCommand::Subscribe(c) | DataCommand::Unsubscribe(c) => c.venue.as_ref(),
            DataCommand::Request(r) => r.venue.as_ref(),
        }
    }
}

/// Payload of a data response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataPayload {
    Instruments(Vec<Instrument>),
    Quotes(Vec<QuoteTick>),
    Trades(Vec<TradeTick>),
    Bars(Vec<Bar>),
    Depth(OrderBookDepth),
}

impl DataPayload {
    pub fn len(&self) -> usize {
        match self {
            DataPayload::Instruments(v) => v.len(),
            DataPayload::Quotes(v) => v.len(),
            DataPayload::Trades(v) => v.len(),
            DataPayload::Bars(v) => v.len(),
            DataPayload::Depth(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Answer to a [`RequestData`], matched by `correlation_id == request_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse {
    pub correlation_id: Uuid,
    pub client_id: ClientId,
    pub data_type: DataType,
    pub payload: DataPayload,
    pub ts_init: Timestamp,
}
