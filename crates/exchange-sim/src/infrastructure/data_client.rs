use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessera_common::{Endpoints, Message, MessageBus};
use tessera_core::commands::{DataPayload, DataResponse, RequestData, SubscribeData};
use tessera_core::data::{Data, DataType};
use tessera_core::{ClientId, Timestamp, Venue};
use tessera_ports::{ClientError, Clock, DataClient};

/// Data client answering requests from preloaded history
///
/// Streaming is driven by the backtest engine itself, so subscriptions only
/// record intent. Requests are answered synchronously through the
/// `DataEngine.response` endpoint with whatever history falls inside the
/// requested window.
pub struct BacktestDataClient {
    client_id: ClientId,
    venue: Venue,
    clock: Rc<dyn Clock>,
    msgbus: Rc<MessageBus>,
    connected: Cell<bool>,
    history: RefCell<Vec<Data>>,
}

impl BacktestDataClient {
    pub fn new(venue: Venue, clock: Rc<dyn Clock>, msgbus: Rc<MessageBus>) -> Self {
        Self {
            client_id: ClientId::new(venue.as_str()),
            venue,
            clock,
            msgbus,
            connected: Cell::new(false),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Make data available to requests; kept sorted by `ts_init`
    pub fn add_data(&self, data: impl IntoIterator<Item = Data>) {
        let mut history = self.history.borrow_mut();
        history.extend(data);
        history.sort_by_key(|d| d.ts_init());
    }

    pub fn clear(&self) {
        self.history.borrow_mut().clear();
    }

    fn check_connected(&self) -> Result<(), ClientError> {
        if self.connected.get() {
            Ok(())
        } else {
            Err(ClientError::NotConnected(self.client_id.to_string()))
        }
    }

    fn subscribe(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.check_connected()?;
        log::debug!(
            "Subscribed backtest data: client_id={}, data_type={:?}",
            self.client_id,
            cmd.data_type
        );
        Ok(())
    }

    fn unsubscribe(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        log::debug!(
            "Unsubscribed backtest data: client_id={}, data_type={:?}",
            self.client_id,
            cmd.data_type
        );
        Ok(())
    }

    fn window(&self, req: &RequestData) -> (Timestamp, Timestamp) {
        let now = self.clock.now();
        (req.start.unwrap_or(now), req.end.unwrap_or(now))
    }

    /// History matching `select` inside the request window, newest `limit` kept
    fn collect<T>(&self, req: &RequestData, select: impl Fn(&Data) -> Option<T>) -> Vec<T> {
        let (start, end) = self.window(req);
        let mut items: Vec<T> = self
            .history
            .borrow()
            .iter()
            .filter(|d| d.ts_init() >= start && d.ts_init() <= end)
            .filter_map(select)
            .collect();
        if let Some(limit) = req.limit
            && items.len() > limit
        {
            items.drain(..items.len() - limit);
        }
        items
    }

    fn respond(&self, req: &RequestData, payload: DataPayload) -> Result<(), ClientError> {
        log::debug!(
            "Responding to data request: request_id={}, items={}",
            req.request_id,
            payload.len()
        );
        let response = DataResponse {
            correlation_id: req.request_id,
            client_id: self.client_id.clone(),
            data_type: req.data_type.clone(),
            payload,
            ts_init: self.clock.now(),
        };
        self.msgbus
            .send(Endpoints::DATA_ENGINE_RESPONSE, &Message::DataResponse(response))
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

impl DataClient for BacktestDataClient {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn venue(&self) -> Option<&Venue> {
        Some(&self.venue)
    }

    fn connect(&self) -> Result<(), ClientError> {
        if !self.connected.replace(true) {
            log::info!("Connected data client: client_id={}", self.client_id);
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ClientError> {
        if self.connected.replace(false) {
            log::info!("Disconnected data client: client_id={}", self.client_id);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn subscribe_instrument(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_instruments(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_quote_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_trade_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_bars(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_order_book_depth(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn unsubscribe_instrument(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_instruments(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_quote_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_trade_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_bars(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_order_book_depth(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn request_instrument(&self, req: &RequestData) -> Result<(), ClientError> {
        self.check_connected()?;
        let DataType::Instrument(instrument_id) = &req.data_type else {
            return Err(ClientError::Rejected(format!("Bad data type {:?}", req.data_type)));
        };
        // Instrument definitions are not bound to the request window
        let instruments = self
            .history
            .borrow()
            .iter()
            .filter_map(|d| match d {
                Data::Instrument(i) if &i.id == instrument_id => Some(i.as_ref().clone()),
                _ => None,
            })
            .collect();
        self.respond(req, DataPayload::Instruments(instruments))
    }

    fn request_instruments(&self, req: &RequestData) -> Result<(), ClientError> {
        self.check_connected()?;
        let DataType::Instruments(venue) = &req.data_type else {
            return Err(ClientError::Rejected(format!("Bad data type {:?}", req.data_type)));
        };
        let instruments = self
            .history
            .borrow()
            .iter()
            .filter_map(|d| match d {
                Data::Instrument(i) if &i.id.venue == venue => Some(i.as_ref().clone()),
                _ => None,
            })
            .collect();
        self.respond(req, DataPayload::Instruments(instruments))
    }

    fn request_quote_ticks(&self, req: &RequestData) -> Result<(), ClientError> {
        self.check_connected()?;
        let DataType::QuoteTicks(instrument_id) = &req.data_type else {
            return Err(ClientError::Rejected(format!("Bad data type {:?}", req.data_type)));
        };
        let quotes = self.collect(req, |d| match d {
            Data::Quote(q) if &q.instrument_id == instrument_id => Some(q.clone()),
            _ => None,
        });
        self.respond(req, DataPayload::Quotes(quotes))
    }

    fn request_trade_ticks(&self, req: &RequestData) -> Result<(), ClientError> {
        self.check_connected()?;
        let DataType::TradeTicks(instrument_id) = &req.data_type else {
            return Err(ClientError::Rejected(format!("Bad data type {:?}", req.data_type)));
        };
        let trades = self.collect(req, |d| match d {
            Data::Trade(t) if &t.instrument_id == instrument_id => Some(t.clone()),
            _ => None,
        });
        self.respond(req, DataPayload::Trades(trades))
    }

    fn request_bars(&self, req: &RequestData) -> Result<(), ClientError> {
        self.check_connected()?;
        let DataType::Bars(bar_type) = &req.data_type else {
            return Err(ClientError::Rejected(format!("Bad data type {:?}", req.data_type)));
        };
        let bars = self.collect(req, |d| match d {
            Data::Bar(b) if &b.bar_type == bar_type => Some(b.clone()),
            _ => None,
        });
        self.respond(req, DataPayload::Bars(bars))
    }

    fn request_order_book_depth(&self, req: &RequestData) -> Result<(), ClientError> {
        self.check_connected()?;
        let DataType::OrderBookDepth { instrument_id, .. } = &req.data_type else {
            return Err(ClientError::Rejected(format!("Bad data type {:?}", req.data_type)));
        };
        let latest = self
            .collect(req, |d| match d {
                Data::Depth(depth) if &depth.instrument_id == instrument_id => Some(depth.clone()),
                _ => None,
            })
            .pop();
        match latest {
            Some(depth) => self.respond(req, DataPayload::Depth(depth)),
            None => Err(ClientError::Rejected(format!("No depth for {instrument_id}"))),
        }
    }
}
