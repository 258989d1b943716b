//! Strategy Trait
//!
//! A strategy reacts to data and order events and answers with [`Action`]s.
//! Every hook has a no-op default, so an implementation overrides only what
//! it trades on.

use serde::{Deserialize, Serialize};
use tessera_core::commands::DataResponse;
use tessera_core::data::{Bar, OrderBookDepth, QuoteTick, TradeTick};
use tessera_core::events::{OrderEventAny, PositionEvent};
use tessera_core::{Instrument, OmsType, StrategyId};
use tessera_ports::TimeEvent;

use crate::actions::Action;
use crate::context::StrategyContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Unique id; its tag (text after the last '-') appears in order ids
    pub strategy_id: StrategyId,
    /// Position netting override for this strategy's orders
    pub oms_type: Option<OmsType>,
    /// Cancel the strategy's open orders when it stops
    pub cancel_orders_on_stop: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strategy_id: StrategyId::new("S-001"),
            oms_type: None,
            cancel_orders_on_stop: true,
        }
    }
}

impl StrategyConfig {
    pub fn new(strategy_id: impl Into<String>) -> Self {
        Self {
            strategy_id: StrategyId::new(strategy_id),
            ..Default::default()
        }
    }
}

/// Strategy trait - implement this for your trading strategy
///
/// Hooks run on the kernel thread while the strategy is borrowed; the
/// returned actions are applied after the borrow ends, so events caused by
/// those actions are delivered through fresh hook calls.
pub trait Strategy {
    fn config(&self) -> &StrategyConfig;

    fn strategy_id(&self) -> &StrategyId {
        &self.config().strategy_id
    }

    /// Called once the strategy is started; typically subscribes to data
    fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_stop(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_resume(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Clear internal state between runs
    fn on_reset(&mut self) {}

    fn on_instrument(&mut self, _instrument: &Instrument, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_quote(&mut self, _quote: &QuoteTick, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_trade(&mut self, _trade: &TradeTick, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_bar(&mut self, _bar: &Bar, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_depth(&mut self, _depth: &OrderBookDepth, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Answer to an [`Action::Request`]
    fn on_data_response(&mut self, _response: &DataResponse, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Called for every event of the strategy's own orders
    fn on_order_event(&mut self, _event: &OrderEventAny, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    fn on_position_event(&mut self, _event: &PositionEvent, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }

    /// Timer or time alert set through [`Action::SetTimer`] / [`Action::SetTimeAlert`]
    fn on_time_event(&mut self, _event: &TimeEvent, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![]
    }
}
