use tessera_core::commands::{RequestData, SubscribeData};
use tessera_core::{ClientId, Venue};

use crate::error::ClientError;

/// Port for market data adapters
///
/// Clients push data and responses back through the message bus
/// (`DataEngine.process` / `DataEngine.response` endpoints); the methods here
/// only issue instructions and must never block.
pub trait DataClient {
    fn client_id(&self) -> &ClientId;

    /// Venue served by this client (None for multi-venue aggregators)
    fn venue(&self) -> Option<&Venue>;

    fn connect(&self) -> Result<(), ClientError>;

    fn disconnect(&self) -> Result<(), ClientError>;

    fn is_connected(&self) -> bool;

    fn subscribe_instrument(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("subscribe_instrument", cmd))
    }

    fn subscribe_instruments(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("subscribe_instruments", cmd))
    }

    fn subscribe_quote_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("subscribe_quote_ticks", cmd))
    }

    fn subscribe_trade_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("subscribe_trade_ticks", cmd))
    }

    fn subscribe_bars(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("subscribe_bars", cmd))
    }

    fn subscribe_order_book_depth(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("subscribe_order_book_depth", cmd))
    }

    fn unsubscribe_instrument(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("unsubscribe_instrument", cmd))
    }

    fn unsubscribe_instruments(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("unsubscribe_instruments", cmd))
    }

    fn unsubscribe_quote_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("unsubscribe_quote_ticks", cmd))
    }

    fn unsubscribe_trade_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("unsubscribe_trade_ticks", cmd))
    }

    fn unsubscribe_bars(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("unsubscribe_bars", cmd))
    }

    fn unsubscribe_order_book_depth(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        Err(unsupported("unsubscribe_order_book_depth", cmd))
    }

    fn request_instrument(&self, req: &RequestData) -> Result<(), ClientError> {
        Err(unsupported_request("request_instrument", req))
    }

    fn request_instruments(&self, req: &RequestData) -> Result<(), ClientError> {
        Err(unsupported_request("request_instruments", req))
    }

    fn request_quote_ticks(&self, req: &RequestData) -> Result<(), ClientError> {
        Err(unsupported_request("request_quote_ticks", req))
    }

    fn request_trade_ticks(&self, req: &RequestData) -> Result<(), ClientError> {
        Err(unsupported_request("request_trade_ticks", req))
    }

    fn request_bars(&self, req: &RequestData) -> Result<(), ClientError> {
        Err(unsupported_request("request_bars", req))
    }

    fn request_order_book_depth(&self, req: &RequestData) -> Result<(), ClientError> {
        Err(unsupported_request("request_order_book_depth", req))
    }
}

fn unsupported(op: &str, cmd: &SubscribeData) -> ClientError {
    ClientError::Unsupported(format!("{op} for {:?}", cmd.data_type))
}

fn unsupported_request(op: &str, req: &RequestData) -> ClientError {
    ClientError::Unsupported(format!("{op} for {:?}", req.data_type))
}
