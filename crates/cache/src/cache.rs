//! In-memory cache of instruments, orders, positions, accounts and market data
//!
//! The cache is the single owner of domain state. Engines read and write it
//! through short borrows on the core thread; every write is mirrored to the
//! optional [`CacheBackend`].

use std::collections::{BTreeSet, HashMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_core::data::{Bar, BarType, OrderBookDepth, PriceType, QuoteTick, TradeTick};
use tessera_core::{
    Account, AccountId, ClientId, ClientOrderId, Instrument, InstrumentId, Order, Position,
    PositionId, Price, Side, StrategyId, Venue, VenueOrderId,
};
use tessera_ports::CacheBackend;

use crate::error::{CacheError, Result};

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Quotes and trades kept per instrument
    pub tick_capacity: usize,
    /// Bars kept per bar type
    pub bar_capacity: usize,
    /// Keep a copy of a netting position each time it closes and reopens
    pub snapshot_positions: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tick_capacity: 10_000,
            bar_capacity: 10_000,
            snapshot_positions: true,
        }
    }
}

#[derive(Debug, Default)]
struct CacheIndex {
    venue_account: HashMap<Venue, AccountId>,
    venue_orders: HashMap<Venue, BTreeSet<ClientOrderId>>,
    venue_order_ids: HashMap<VenueOrderId, ClientOrderId>,
    client_order_ids: HashMap<ClientOrderId, VenueOrderId>,
    order_position: HashMap<ClientOrderId, PositionId>,
    order_strategy: HashMap<ClientOrderId, StrategyId>,
    order_client: HashMap<ClientOrderId, ClientId>,
    position_orders: HashMap<PositionId, BTreeSet<ClientOrderId>>,
    instrument_orders: HashMap<InstrumentId, BTreeSet<ClientOrderId>>,
    instrument_positions: HashMap<InstrumentId, BTreeSet<PositionId>>,
    strategy_orders: HashMap<StrategyId, BTreeSet<ClientOrderId>>,
    strategy_positions: HashMap<StrategyId, BTreeSet<PositionId>>,
    orders_open: BTreeSet<ClientOrderId>,
    orders_closed: BTreeSet<ClientOrderId>,
    orders_inflight: BTreeSet<ClientOrderId>,
    positions_open: BTreeSet<PositionId>,
    positions_closed: BTreeSet<PositionId>,
}

impl CacheIndex {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn index_order_status(&mut self, order: &Order) {
        let id = &order.client_order_id;
        self.orders_open.remove(id);
        self.orders_closed.remove(id);
        self.orders_inflight.remove(id);
        if order.is_closed() {
            self.orders_closed.insert(id.clone());
        } else {
            if order.is_open() {
                self.orders_open.insert(id.clone());
            }
            if order.is_inflight() {
                self.orders_inflight.insert(id.clone());
            }
        }
    }

    fn index_position_status(&mut self, position: &Position) {
        if position.is_open() {
            self.positions_closed.remove(&position.id);
            self.positions_open.insert(position.id.clone());
        } else {
            self.positions_open.remove(&position.id);
            self.positions_closed.insert(position.id.clone());
        }
    }
}

/// Central store of domain state
pub struct Cache {
    config: CacheConfig,
    backend: Option<Box<dyn CacheBackend>>,
    instruments: HashMap<InstrumentId, Instrument>,
    accounts: HashMap<AccountId, Account>,
    orders: HashMap<ClientOrderId, Order>,
    positions: HashMap<PositionId, Position>,
    position_snapshots: HashMap<PositionId, Vec<Position>>,
    quotes: HashMap<InstrumentId, VecDeque<QuoteTick>>,
    trades: HashMap<InstrumentId, VecDeque<TradeTick>>,
    bars: HashMap<BarType, VecDeque<Bar>>,
    depths: HashMap<InstrumentId, OrderBookDepth>,
    index: CacheIndex,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default(), None)
    }
}

impl Cache {
    pub fn new(config: CacheConfig, backend: Option<Box<dyn CacheBackend>>) -> Self {
        Self {
            config,
            backend,
            instruments: HashMap::new(),
            accounts: HashMap::new(),
            orders: HashMap::new(),
            positions: HashMap::new(),
            position_snapshots: HashMap::new(),
            quotes: HashMap::new(),
            trades: HashMap::new(),
            bars: HashMap::new(),
            depths: HashMap::new(),
            index: CacheIndex::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Rebuild the cache from the backend
    ///
    /// In-memory state is replaced; nothing is written back.
    pub fn cache_all(&mut self) -> Result<()> {
        let Some(backend) = self.backend.as_ref() else {
            log::warn!("Cache: no backend to load from");
            return Ok(());
        };
        let instruments = backend.load_instruments()?;
        let accounts = backend.load_accounts()?;
        let orders = backend.load_orders()?;
        let positions = backend.load_positions()?;

        self.clear_state();
        for instrument in instruments {
            self.instruments.insert(instrument.id.clone(), instrument);
        }
        for account in accounts {
            self.index
                .venue_account
                .insert(account.id.venue(), account.id.clone());
            self.accounts.insert(account.id.clone(), account);
        }
        for order in orders {
            self.index_new_order(&order, order.position_id.clone(), None);
            if let Some(venue_order_id) = &order.venue_order_id {
                self.index
                    .venue_order_ids
                    .insert(venue_order_id.clone(), order.client_order_id.clone());
                self.index
                    .client_order_ids
                    .insert(order.client_order_id.clone(), venue_order_id.clone());
            }
            self.orders.insert(order.client_order_id.clone(), order);
        }
        for position in positions {
            self.index_new_position(&position);
            self.positions.insert(position.id.clone(), position);
        }

        log::info!(
            "Cache loaded: instruments={}, accounts={}, orders={}, positions={}",
            self.instruments.len(),
            self.accounts.len(),
            self.orders.len(),
            self.positions.len()
        );
        Ok(())
    }

    fn clear_state(&mut self) {
        self.instruments.clear();
        self.accounts.clear();
        self.orders.clear();
        self.positions.clear();
        self.position_snapshots.clear();
        self.quotes.clear();
        self.trades.clear();
        self.bars.clear();
        self.depths.clear();
        self.index.clear();
    }

    /// Drop all in-memory state (the backend is left untouched)
    pub fn reset(&mut self) {
        self.clear_state();
        log::debug!("Cache reset");
    }

    /// Drop everything stored in the backend
    pub fn flush_backend(&mut self) -> Result<()> {
        if let Some(backend) = &self.backend {
            backend.flush()?;
        }
        Ok(())
    }

    // Instruments

    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<()> {
        if let Some(backend) = &self.backend {
            backend.add_instrument(&instrument)?;
        }
        log::debug!("Cache added instrument: id={}", instrument.id);
        self.instruments.insert(instrument.id.clone(), instrument);
        Ok(())
    }

    pub fn instrument(&self, instrument_id: &InstrumentId) -> Option<&Instrument> {
        self.instruments.get(instrument_id)
    }

    /// Instruments, optionally for one venue, sorted by id
    pub fn instruments(&self, venue: Option<&Venue>) -> Vec<&Instrument> {
        let mut instruments: Vec<&Instrument> = self
            .instruments
            .values()
            .filter(|i| venue.is_none_or(|v| &i.id.venue == v))
            .collect();
        instruments.sort_by(|a, b| a.id.cmp(&b.id));
        instruments
    }

    pub fn instrument_ids(&self, venue: Option<&Venue>) -> Vec<InstrumentId> {
        self.instruments(venue)
            .into_iter()
            .map(|i| i.id.clone())
            .collect()
    }

    // Accounts

    pub fn add_account(&mut self, account: Account) -> Result<()> {
        if let Some(backend) = &self.backend {
            backend.add_account(&account)?;
        }
        log::debug!("Cache added account: id={}", account.id);
        self.index
            .venue_account
            .insert(account.id.venue(), account.id.clone());
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    /// Replace a stored account with its updated version
    pub fn update_account(&mut self, account: Account) -> Result<()> {
        if !self.accounts.contains_key(&account.id) {
            return Err(CacheError::AccountNotFound(account.id));
        }
        if let Some(backend) = &self.backend {
            backend.update_account(&account)?;
        }
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    pub fn account(&self, account_id: &AccountId) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn account_for_venue(&self, venue: &Venue) -> Option<&Account> {
        self.index
            .venue_account
            .get(venue)
            .and_then(|id| self.accounts.get(id))
    }

    pub fn account_id_for_venue(&self, venue: &Venue) -> Option<&AccountId> {
        self.index.venue_account.get(venue)
    }

    pub fn accounts(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.values().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    // Orders

    fn index_new_order(
        &mut self,
        order: &Order,
        position_id: Option<PositionId>,
        client_id: Option<ClientId>,
    ) {
        let id = &order.client_order_id;
        self.index
            .venue_orders
            .entry(order.instrument_id.venue.clone())
            .or_default()
            .insert(id.clone());
        self.index
            .instrument_orders
            .entry(order.instrument_id.clone())
            .or_default()
            .insert(id.clone());
        self.index
            .strategy_orders
            .entry(order.strategy_id.clone())
            .or_default()
            .insert(id.clone());
        self.index
            .order_strategy
            .insert(id.clone(), order.strategy_id.clone());
        if let Some(client_id) = client_id {
            self.index.order_client.insert(id.clone(), client_id);
        }
        if let Some(position_id) = position_id {
            self.index
                .position_orders
                .entry(position_id.clone())
                .or_default()
                .insert(id.clone());
            self.index.order_position.insert(id.clone(), position_id);
        }
        self.index.index_order_status(order);
    }

    /// Add a new order
    ///
    /// A client order id may only be added once for the lifetime of the cache.
    pub fn add_order(
        &mut self,
        order: Order,
        position_id: Option<PositionId>,
        client_id: Option<ClientId>,
    ) -> Result<()> {
        if self.orders.contains_key(&order.client_order_id) {
            log::error!(
                "Cache rejected duplicate order: client_order_id={}",
                order.client_order_id
            );
            return Err(CacheError::DuplicateOrder(order.client_order_id));
        }
        if let Some(backend) = &self.backend {
            backend.add_order(&order)?;
        }
        log::debug!(
            "Cache added order: client_order_id={}, instrument={}, strategy={}",
            order.client_order_id,
            order.instrument_id,
            order.strategy_id
        );
        self.index_new_order(&order, position_id, client_id);
        self.orders.insert(order.client_order_id.clone(), order);
        Ok(())
    }

    /// Replace a stored order with its updated version and reindex it
    pub fn update_order(&mut self, order: Order) -> Result<()> {
        if !self.orders.contains_key(&order.client_order_id) {
            return Err(CacheError::OrderNotFound(order.client_order_id));
        }
        if let Some(venue_order_id) = order.venue_order_id.clone() {
            self.add_venue_order_id(&order.client_order_id, &venue_order_id)?;
        }
        if let Some(backend) = &self.backend {
            backend.update_order(&order)?;
        }
        self.index.index_order_status(&order);
        self.orders.insert(order.client_order_id.clone(), order);
        Ok(())
    }

    /// Index the venue-assigned id of an order
    pub fn add_venue_order_id(
        &mut self,
        client_order_id: &ClientOrderId,
        venue_order_id: &VenueOrderId,
    ) -> Result<()> {
        if let Some(existing) = self.index.client_order_ids.get(client_order_id) {
            if existing == venue_order_id {
                return Ok(());
            }
            // Venues may re-key an order on modify
            log::debug!(
                "Cache re-keyed venue order id: client_order_id={client_order_id}, old={existing}, new={venue_order_id}"
            );
        }
        if let Some(owner) = self.index.venue_order_ids.get(venue_order_id) {
            if owner != client_order_id {
                return Err(CacheError::VenueOrderIdConflict {
                    venue_order_id: venue_order_id.clone(),
                    owner: owner.clone(),
                    client_order_id: client_order_id.clone(),
                });
            }
        }
        self.index
            .venue_order_ids
            .insert(venue_order_id.clone(), client_order_id.clone());
        self.index
            .client_order_ids
            .insert(client_order_id.clone(), venue_order_id.clone());
        Ok(())
    }

    pub fn order(&self, client_order_id: &ClientOrderId) -> Option<&Order> {
        self.orders.get(client_order_id)
    }

    pub fn order_exists(&self, client_order_id: &ClientOrderId) -> bool {
        self.orders.contains_key(client_order_id)
    }

    pub fn client_order_id(&self, venue_order_id: &VenueOrderId) -> Option<&ClientOrderId> {
        self.index.venue_order_ids.get(venue_order_id)
    }

    pub fn venue_order_id(&self, client_order_id: &ClientOrderId) -> Option<&VenueOrderId> {
        self.index.client_order_ids.get(client_order_id)
    }

    pub fn strategy_id_for_order(&self, client_order_id: &ClientOrderId) -> Option<&StrategyId> {
        self.index.order_strategy.get(client_order_id)
    }

    pub fn client_id_for_order(&self, client_order_id: &ClientOrderId) -> Option<&ClientId> {
        self.index.order_client.get(client_order_id)
    }

    fn select_orders<'a>(
        &'a self,
        ids: impl Iterator<Item = &'a ClientOrderId>,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
        side: Option<Side>,
    ) -> Vec<&'a Order> {
        let mut orders: Vec<&Order> = ids
            .filter_map(|id| self.orders.get(id))
            .filter(|o| venue.is_none_or(|v| &o.instrument_id.venue == v))
            .filter(|o| instrument_id.is_none_or(|i| &o.instrument_id == i))
            .filter(|o| strategy_id.is_none_or(|s| &o.strategy_id == s))
            .filter(|o| side.is_none_or(|s| o.side == s))
            .collect();
        orders.sort_by(|a, b| {
            a.ts_init
                .cmp(&b.ts_init)
                .then_with(|| a.client_order_id.cmp(&b.client_order_id))
        });
        orders
    }

    /// All orders matching the filters, oldest first
    pub fn orders(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
        side: Option<Side>,
    ) -> Vec<&Order> {
        self.select_orders(self.orders.keys(), venue, instrument_id, strategy_id, side)
    }

    /// Orders live at a venue, oldest first
    pub fn orders_open(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
        side: Option<Side>,
    ) -> Vec<&Order> {
        self.select_orders(
            self.index.orders_open.iter(),
            venue,
            instrument_id,
            strategy_id,
            side,
        )
    }

    pub fn orders_closed(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
        side: Option<Side>,
    ) -> Vec<&Order> {
        self.select_orders(
            self.index.orders_closed.iter(),
            venue,
            instrument_id,
            strategy_id,
            side,
        )
    }

    pub fn orders_inflight(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
        side: Option<Side>,
    ) -> Vec<&Order> {
        self.select_orders(
            self.index.orders_inflight.iter(),
            venue,
            instrument_id,
            strategy_id,
            side,
        )
    }

    pub fn orders_for_position(&self, position_id: &PositionId) -> Vec<&Order> {
        match self.index.position_orders.get(position_id) {
            Some(ids) => self.select_orders(ids.iter(), None, None, None, None),
            None => Vec::new(),
        }
    }

    pub fn orders_open_count(&self, venue: Option<&Venue>) -> usize {
        self.orders_open(venue, None, None, None).len()
    }

    pub fn orders_total_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_order_open(&self, client_order_id: &ClientOrderId) -> bool {
        self.index.orders_open.contains(client_order_id)
    }

    pub fn is_order_closed(&self, client_order_id: &ClientOrderId) -> bool {
        self.index.orders_closed.contains(client_order_id)
    }

    pub fn is_order_inflight(&self, client_order_id: &ClientOrderId) -> bool {
        self.index.orders_inflight.contains(client_order_id)
    }

    // Positions

    /// Link an order to the position its fills apply to
    pub fn add_position_id(
        &mut self,
        position_id: &PositionId,
        client_order_id: &ClientOrderId,
        strategy_id: &StrategyId,
    ) {
        self.index
            .order_position
            .insert(client_order_id.clone(), position_id.clone());
        self.index
            .position_orders
            .entry(position_id.clone())
            .or_default()
            .insert(client_order_id.clone());
        self.index
            .strategy_positions
            .entry(strategy_id.clone())
            .or_default()
            .insert(position_id.clone());
    }

    pub fn position_id(&self, client_order_id: &ClientOrderId) -> Option<&PositionId> {
        self.index.order_position.get(client_order_id)
    }

    fn index_new_position(&mut self, position: &Position) {
        self.index
            .instrument_positions
            .entry(position.instrument_id.clone())
            .or_default()
            .insert(position.id.clone());
        self.index
            .strategy_positions
            .entry(position.strategy_id.clone())
            .or_default()
            .insert(position.id.clone());
        self.add_position_id(
            &position.id,
            &position.opening_order_id,
            &position.strategy_id,
        );
        self.index.index_position_status(position);
    }

    pub fn add_position(&mut self, position: Position) -> Result<()> {
        if self.positions.contains_key(&position.id) {
            return Err(CacheError::DuplicatePosition(position.id));
        }
        if let Some(backend) = &self.backend {
            backend.add_position(&position)?;
        }
        log::debug!(
            "Cache added position: id={}, instrument={}, signed_qty={}",
            position.id,
            position.instrument_id,
            position.signed_qty
        );
        self.index_new_position(&position);
        self.positions.insert(position.id.clone(), position);
        Ok(())
    }

    /// Replace a stored position and move it between open/closed indexes
    pub fn update_position(&mut self, position: Position) -> Result<()> {
        if !self.positions.contains_key(&position.id) {
            return Err(CacheError::PositionNotFound(position.id));
        }
        if let Some(backend) = &self.backend {
            backend.update_position(&position)?;
        }
        self.index.index_position_status(&position);
        self.positions.insert(position.id.clone(), position);
        Ok(())
    }

    /// Keep a copy of a closed netting position before its id is reused
    pub fn snapshot_position(&mut self, position: &Position) {
        if !self.config.snapshot_positions {
            return;
        }
        self.position_snapshots
            .entry(position.id.clone())
            .or_default()
            .push(position.clone());
    }

    /// Replace a closed position that is reopening under the same id
    pub fn replace_position(&mut self, position: Position) -> Result<()> {
        if let Some(previous) = self.positions.remove(&position.id) {
            self.snapshot_position(&previous);
        }
        if let Some(backend) = &self.backend {
            backend.update_position(&position)?;
        }
        self.index_new_position(&position);
        self.positions.insert(position.id.clone(), position);
        Ok(())
    }

    pub fn position_snapshots(&self, position_id: &PositionId) -> &[Position] {
        self.position_snapshots
            .get(position_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn position(&self, position_id: &PositionId) -> Option<&Position> {
        self.positions.get(position_id)
    }

    pub fn position_for_order(&self, client_order_id: &ClientOrderId) -> Option<&Position> {
        self.position_id(client_order_id)
            .and_then(|id| self.positions.get(id))
    }

    pub fn position_exists(&self, position_id: &PositionId) -> bool {
        self.positions.contains_key(position_id)
    }

    fn select_positions<'a>(
        &'a self,
        ids: impl Iterator<Item = &'a PositionId>,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&'a Position> {
        let mut positions: Vec<&Position> = ids
            .filter_map(|id| self.positions.get(id))
            .filter(|p| venue.is_none_or(|v| &p.instrument_id.venue == v))
            .filter(|p| instrument_id.is_none_or(|i| &p.instrument_id == i))
            .filter(|p| strategy_id.is_none_or(|s| &p.strategy_id == s))
            .collect();
        positions.sort_by(|a, b| {
            a.ts_opened
                .cmp(&b.ts_opened)
                .then_with(|| a.id.cmp(&b.id))
        });
        positions
    }

    pub fn positions(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.select_positions(self.positions.keys(), venue, instrument_id, strategy_id)
    }

    pub fn positions_open(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.select_positions(
            self.index.positions_open.iter(),
            venue,
            instrument_id,
            strategy_id,
        )
    }

    pub fn positions_closed(
        &self,
        venue: Option<&Venue>,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.select_positions(
            self.index.positions_closed.iter(),
            venue,
            instrument_id,
            strategy_id,
        )
    }

    pub fn positions_open_count(&self, venue: Option<&Venue>) -> usize {
        self.positions_open(venue, None, None).len()
    }

    pub fn positions_total_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_position_open(&self, position_id: &PositionId) -> bool {
        self.index.positions_open.contains(position_id)
    }

    pub fn is_position_closed(&self, position_id: &PositionId) -> bool {
        self.index.positions_closed.contains(position_id)
    }

    // Market data

    pub fn add_quote(&mut self, quote: QuoteTick) {
        let capacity = self.config.tick_capacity;
        let quotes = self.quotes.entry(quote.instrument_id.clone()).or_default();
        if quotes.len() >= capacity {
            quotes.pop_back();
        }
        quotes.push_front(quote);
    }

    pub fn add_quotes(&mut self, quotes: Vec<QuoteTick>) {
        for quote in quotes {
            self.add_quote(quote);
        }
    }

    pub fn add_trade(&mut self, trade: TradeTick) {
        let capacity = self.config.tick_capacity;
        let trades = self.trades.entry(trade.instrument_id.clone()).or_default();
        if trades.len() >= capacity {
            trades.pop_back();
        }
        trades.push_front(trade);
    }

    pub fn add_trades(&mut self, trades: Vec<TradeTick>) {
        for trade in trades {
            self.add_trade(trade);
        }
    }

    pub fn add_bar(&mut self, bar: Bar) {
        let capacity = self.config.bar_capacity;
        let bars = self.bars.entry(bar.bar_type.clone()).or_default();
        if bars.len() >= capacity {
            bars.pop_back();
        }
        bars.push_front(bar);
    }

    pub fn add_bars(&mut self, bars: Vec<Bar>) {
        for bar in bars {
            self.add_bar(bar);
        }
    }

    pub fn add_depth(&mut self, depth: OrderBookDepth) {
        self.depths.insert(depth.instrument_id.clone(), depth);
    }

    /// Latest quote
    pub fn quote(&self, instrument_id: &InstrumentId) -> Option<&QuoteTick> {
        self.quotes.get(instrument_id).and_then(|q| q.front())
    }

    /// Cached quotes, newest first
    pub fn quotes(&self, instrument_id: &InstrumentId) -> Vec<&QuoteTick> {
        self.quotes
            .get(instrument_id)
            .map(|q| q.iter().collect())
            .unwrap_or_default()
    }

    pub fn trade(&self, instrument_id: &InstrumentId) -> Option<&TradeTick> {
        self.trades.get(instrument_id).and_then(|t| t.front())
    }

    /// Cached trades, newest first
    pub fn trades(&self, instrument_id: &InstrumentId) -> Vec<&TradeTick> {
        self.trades
            .get(instrument_id)
            .map(|t| t.iter().collect())
            .unwrap_or_default()
    }

    pub fn bar(&self, bar_type: &BarType) -> Option<&Bar> {
        self.bars.get(bar_type).and_then(|b| b.front())
    }

    /// Cached bars, newest first
    pub fn bars(&self, bar_type: &BarType) -> Vec<&Bar> {
        self.bars
            .get(bar_type)
            .map(|b| b.iter().collect())
            .unwrap_or_default()
    }

    pub fn depth(&self, instrument_id: &InstrumentId) -> Option<&OrderBookDepth> {
        self.depths.get(instrument_id)
    }

    pub fn quote_count(&self, instrument_id: &InstrumentId) -> usize {
        self.quotes.get(instrument_id).map_or(0, VecDeque::len)
    }

    pub fn trade_count(&self, instrument_id: &InstrumentId) -> usize {
        self.trades.get(instrument_id).map_or(0, VecDeque::len)
    }

    /// Latest price of the requested type
    ///
    /// `Last` falls back to the close of the most recent bar when no trade has
    /// been seen.
    pub fn price(&self, instrument_id: &InstrumentId, price_type: PriceType) -> Option<Price> {
        match price_type {
            PriceType::Bid => self.quote(instrument_id).map(|q| q.bid_price),
            PriceType::Ask => self.quote(instrument_id).map(|q| q.ask_price),
            PriceType::Mid => self.quote(instrument_id).map(QuoteTick::mid_price),
            PriceType::Last => self.trade(instrument_id).map(|t| t.price).or_else(|| {
                self.bars
                    .iter()
                    .filter(|(bar_type, _)| &bar_type.instrument_id == instrument_id)
                    .filter_map(|(_, bars)| bars.front())
                    .max_by(|a, b| a.ts_event.cmp(&b.ts_event))
                    .map(|bar| bar.close)
            }),
        }
    }

    /// Best available reference price: last trade, else mid quote
    pub fn reference_price(&self, instrument_id: &InstrumentId) -> Option<Price> {
        self.price(instrument_id, PriceType::Last)
            .or_else(|| self.price(instrument_id, PriceType::Mid))
    }

    /// Price a position is marked at: the side it would close against
    pub fn mark_price(&self, instrument_id: &InstrumentId, signed_qty: Decimal) -> Option<Price> {
        let quote_side = if signed_qty > Decimal::ZERO {
            self.price(instrument_id, PriceType::Bid)
        } else {
            self.price(instrument_id, PriceType::Ask)
        };
        quote_side.or_else(|| self.price(instrument_id, PriceType::Last))
    }
}
