//! Venue state reconciliation
//!
//! Aligns cached orders and positions with an [`ExecutionMassStatus`]
//! reported by an execution client. Differences are closed by generating
//! the order events the venue implies, routed through the normal event path
//! so positions and accounts follow.
//!
//! ## Order reports
//!
//! | Local state              | Venue report                 | Generated events                |
//! |--------------------------|------------------------------|---------------------------------|
//! | unknown                  | any                          | external order, then as below   |
//! | Initialized / Submitted  | Rejected                     | `Rejected`                      |
//! | Initialized / Submitted  | anything else                | `Accepted`                      |
//! | missing trade ids        | fill reports present         | one `Filled` per missing trade  |
//! | filled less than venue   | no fill reports for the rest | one synthetic `Filled`          |
//! | open                     | quantity/price changed       | `Updated`                       |
//! | open                     | Canceled / Expired           | `Canceled` / `Expired`          |
//!
//! ## Position reports
//!
//! A quantity mismatch becomes one synthetic market fill priced so the
//! resulting average matches the venue; see [`calculate_reconciliation_price`].

use rust_decimal::Decimal;
use tessera_core::events::{
    OrderAccepted, OrderCanceled, OrderEventAny, OrderExpired, OrderFilled, OrderInitialized,
    OrderRejected, OrderTriggered, OrderUpdated,
};
use tessera_core::reports::{ExecutionMassStatus, FillReport, OrderStatusReport, PositionStatusReport};
use tessera_core::{
    ClientId, ClientOrderId, InstrumentId, LiquiditySide, Money, Order, OrderStatus, OrderType,
    Position, Price, Quantity, Side, StrategyId, TimeInForce, TradeId, VenueOrderId,
};

use crate::engine::ExecutionEngine;

/// Strategy id assigned to orders the kernel did not create
pub const EXTERNAL_STRATEGY: &str = "EXTERNAL";

/// Result of reconciling one report
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// Local state already matched the venue
    InSync,
    /// Events applied to bring local state in line
    Applied(Vec<OrderEventAny>),
    /// The difference cannot be closed with generated events
    Unreconcilable(String),
}

impl ReconciliationOutcome {
    pub fn is_unreconcilable(&self) -> bool {
        matches!(self, Self::Unreconcilable(_))
    }
}

/// Per-report outcomes of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationReport {
    pub orders: Vec<(VenueOrderId, ReconciliationOutcome)>,
    pub positions: Vec<(InstrumentId, ReconciliationOutcome)>,
}

impl ReconciliationReport {
    /// True when no report was left unreconcilable
    pub fn is_reconciled(&self) -> bool {
        self.unreconcilable().is_empty()
    }

    pub fn unreconcilable(&self) -> Vec<&str> {
        self.orders
            .iter()
            .map(|(_, o)| o)
            .chain(self.positions.iter().map(|(_, o)| o))
            .filter_map(|o| match o {
                ReconciliationOutcome::Unreconcilable(reason) => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Total number of events generated
    pub fn events_applied(&self) -> usize {
        self.orders
            .iter()
            .map(|(_, o)| o)
            .chain(self.positions.iter().map(|(_, o)| o))
            .map(|o| match o {
                ReconciliationOutcome::Applied(events) => events.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Price of the fill that moves a position from `current` to `target`
///
/// Returns `None` when no positive price can produce the target average.
/// A side flip or an opening from flat uses the target average directly.
pub fn calculate_reconciliation_price(
    current_qty: Decimal,
    current_avg_px: Option<Price>,
    target_qty: Decimal,
    target_avg_px: Option<Price>,
) -> Option<Price> {
    let qty_diff = target_qty - current_qty;
    if qty_diff.is_zero() {
        return None;
    }
    if target_qty.is_zero() {
        return current_avg_px;
    }
    let target_avg = target_avg_px.filter(|px| !px.is_zero())?;
    let Some(current_avg) = current_avg_px.filter(|_| !current_qty.is_zero()) else {
        return Some(target_avg);
    };
    if current_qty.is_sign_positive() != target_qty.is_sign_positive() {
        return Some(target_avg);
    }
    let price = (target_qty * target_avg - current_qty * current_avg) / qty_diff;
    (price > Decimal::ZERO).then_some(price)
}

impl ExecutionEngine {
    /// Reconcile local state against a venue mass status
    ///
    /// Order reports are processed oldest first, then fills whose order was
    /// not reported, then positions.
    pub fn reconcile_state(&self, mass_status: &ExecutionMassStatus) -> ReconciliationReport {
        log::info!(
            "Reconciling execution state: client_id={}, venue={}, orders={}, fills={}, positions={}",
            mass_status.client_id,
            mass_status.venue,
            mass_status.order_reports.len(),
            mass_status.fill_reports.len(),
            mass_status.position_reports.len()
        );
        let mut report = ReconciliationReport::default();

        let mut order_reports: Vec<&OrderStatusReport> = mass_status.order_reports.iter().collect();
        order_reports.sort_by(|a, b| {
            a.ts_last
                .cmp(&b.ts_last)
                .then_with(|| a.venue_order_id.cmp(&b.venue_order_id))
        });
        for order_report in order_reports {
            self.report_count.set(self.report_count.get() + 1);
            let fills = mass_status.fills_for(&order_report.venue_order_id);
            let outcome = self.reconcile_order_report(order_report, &fills, &mass_status.client_id);
            report.orders.push((order_report.venue_order_id.clone(), outcome));
        }

        let mut orphaned: Vec<VenueOrderId> = mass_status
            .fill_reports
            .iter()
            .map(|f| f.venue_order_id.clone())
            .filter(|id| !mass_status.order_reports.iter().any(|r| &r.venue_order_id == id))
            .collect();
        orphaned.sort();
        orphaned.dedup();
        for venue_order_id in orphaned {
            self.report_count.set(self.report_count.get() + 1);
            let fills = mass_status.fills_for(&venue_order_id);
            let outcome = self.reconcile_orphan_fills(&venue_order_id, &fills);
            report.orders.push((venue_order_id, outcome));
        }

        let mut position_reports: Vec<&PositionStatusReport> =
            mass_status.position_reports.iter().collect();
        position_reports.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        for position_report in position_reports {
            self.report_count.set(self.report_count.get() + 1);
            let outcome = self.reconcile_position_report(position_report);
            report
                .positions
                .push((position_report.instrument_id.clone(), outcome));
        }

        log::info!(
            "Reconciled execution state: client_id={}, events={}, unreconcilable={}",
            mass_status.client_id,
            report.events_applied(),
            report.unreconcilable().len()
        );
        report
    }

    fn local_order(&self, client_order_id: Option<&ClientOrderId>, venue_order_id: &VenueOrderId) -> Option<Order> {
        let cache = self.cache.borrow();
        client_order_id
            .and_then(|id| cache.order(id))
            .or_else(|| cache.client_order_id(venue_order_id).and_then(|id| cache.order(id)))
            .cloned()
    }

    fn current_order(&self, client_order_id: &ClientOrderId) -> Option<Order> {
        self.cache.borrow().order(client_order_id).cloned()
    }

    fn apply_generated(&self, event: OrderEventAny, applied: &mut Vec<OrderEventAny>) {
        if self.handle_event(event.clone()) {
            applied.push(event);
        }
    }

    /// Reconcile one order status report with its fill reports
    pub fn reconcile_order_report(
        &self,
        report: &OrderStatusReport,
        fills: &[&FillReport],
        client_id: &ClientId,
    ) -> ReconciliationOutcome {
        let order = match self.local_order(report.client_order_id.as_ref(), &report.venue_order_id) {
            Some(order) => order,
            None if self.config.filter_unclaimed_external_orders => {
                log::info!(
                    "Filtered unclaimed external order: venue_order_id={}, instrument={}",
                    report.venue_order_id,
                    report.instrument_id
                );
                return ReconciliationOutcome::InSync;
            }
            None => match self.adopt_external_order(report, client_id) {
                Ok(order) => order,
                Err(reason) => return ReconciliationOutcome::Unreconcilable(reason),
            },
        };
        let client_order_id = order.client_order_id.clone();
        let mut applied = Vec::new();

        if matches!(order.status, OrderStatus::Initialized | OrderStatus::Submitted) {
            if report.status == OrderStatus::Rejected {
                let event = OrderRejected::new(&order, report.account_id.clone(), "reported rejected by venue", report.ts_last);
                self.apply_generated(OrderEventAny::Rejected(event), &mut applied);
                return outcome_from(applied);
            }
            let event = OrderAccepted::new(&order, report.venue_order_id.clone(), report.account_id.clone(), report.ts_last);
            self.apply_generated(OrderEventAny::Accepted(event), &mut applied);
        }

        let Some(mut order) = self.current_order(&client_order_id) else {
            return ReconciliationOutcome::Unreconcilable(format!("order {client_order_id} vanished"));
        };

        for fill in fills {
            if order.trade_ids.contains(&fill.trade_id) {
                continue;
            }
            match self.fill_from_report(&order, fill) {
                Some(event) => self.apply_generated(OrderEventAny::Filled(event), &mut applied),
                None => {
                    return ReconciliationOutcome::Unreconcilable(format!(
                        "instrument {} not cached",
                        report.instrument_id
                    ));
                }
            }
        }
        if let Some(updated) = self.current_order(&client_order_id) {
            order = updated;
        }

        if report.filled_qty > order.filled_qty {
            let Some(avg_px) = report.avg_px else {
                return ReconciliationOutcome::Unreconcilable(format!(
                    "order {client_order_id} filled {} at venue without an average price",
                    report.filled_qty
                ));
            };
            let last_qty = report.filled_qty - order.filled_qty;
            let last_px = synthetic_fill_price(order.filled_qty, order.avg_px, report.filled_qty, avg_px);
            let Some(fill) = self.synthetic_fill(&order, report, last_qty, last_px) else {
                return ReconciliationOutcome::Unreconcilable(format!(
                    "instrument {} not cached",
                    report.instrument_id
                ));
            };
            self.apply_generated(OrderEventAny::Filled(fill), &mut applied);
            if let Some(updated) = self.current_order(&client_order_id) {
                order = updated;
            }
        } else if report.filled_qty < order.filled_qty {
            let reason = format!(
                "order {client_order_id} filled {} locally but {} at venue",
                order.filled_qty, report.filled_qty
            );
            log::error!("Cannot reconcile order: {reason}");
            return ReconciliationOutcome::Unreconcilable(reason);
        }

        if order.is_open()
            && (order.quantity != report.quantity
                || (report.price.is_some() && order.price != report.price)
                || (report.trigger_price.is_some() && order.trigger_price != report.trigger_price))
        {
            let event = OrderUpdated::new(&order, report.quantity, report.price, report.trigger_price, report.ts_last);
            self.apply_generated(OrderEventAny::Updated(event), &mut applied);
            if let Some(updated) = self.current_order(&client_order_id) {
                order = updated;
            }
        }

        match report.status {
            OrderStatus::Canceled if !order.is_closed() => {
                let event = OrderCanceled::new(&order, report.ts_last);
                self.apply_generated(OrderEventAny::Canceled(event), &mut applied);
            }
            OrderStatus::Expired if !order.is_closed() => {
                let event = OrderExpired::new(&order, report.ts_last);
                self.apply_generated(OrderEventAny::Expired(event), &mut applied);
            }
            OrderStatus::Triggered if !order.is_triggered => {
                let event = OrderTriggered::new(&order, report.ts_last);
                self.apply_generated(OrderEventAny::Triggered(event), &mut applied);
            }
            OrderStatus::Accepted
            | OrderStatus::Working
            | OrderStatus::PartiallyFilled
            | OrderStatus::Triggered
                if order.is_closed() =>
            {
                let reason = format!(
                    "order {client_order_id} open at venue but {:?} locally",
                    order.status
                );
                log::error!("Cannot reconcile order: {reason}");
                return ReconciliationOutcome::Unreconcilable(reason);
            }
            _ => {}
        }

        outcome_from(applied)
    }

    fn reconcile_orphan_fills(&self, venue_order_id: &VenueOrderId, fills: &[&FillReport]) -> ReconciliationOutcome {
        let client_order_id = fills.iter().find_map(|f| f.client_order_id.as_ref());
        let Some(order) = self.local_order(client_order_id, venue_order_id) else {
            let reason = format!("fills reported for unknown order {venue_order_id}");
            log::warn!("Cannot reconcile fills: {reason}");
            return ReconciliationOutcome::Unreconcilable(reason);
        };
        let mut applied = Vec::new();
        for fill in fills {
            let Some(current) = self.current_order(&order.client_order_id) else {
                break;
            };
            if current.trade_ids.contains(&fill.trade_id) {
                continue;
            }
            if let Some(event) = self.fill_from_report(&current, fill) {
                self.apply_generated(OrderEventAny::Filled(event), &mut applied);
            }
        }
        outcome_from(applied)
    }

    fn adopt_external_order(&self, report: &OrderStatusReport, client_id: &ClientId) -> Result<Order, String> {
        let client_order_id = report
            .client_order_id
            .clone()
            .unwrap_or_else(|| ClientOrderId::new(format!("O-{}", report.venue_order_id)));
        let init = OrderInitialized {
            trader_id: self.msgbus.trader_id().clone(),
            strategy_id: StrategyId::new(EXTERNAL_STRATEGY),
            instrument_id: report.instrument_id.clone(),
            client_order_id,
            side: report.side,
            order_type: report.order_type,
            quantity: report.quantity,
            price: report.price,
            trigger_price: report.trigger_price,
            time_in_force: report.time_in_force,
            post_only: false,
            reduce_only: false,
            ts_event: report.ts_last,
            ts_init: report.ts_init,
        };
        let order = Order::new(init).map_err(|e| e.to_string())?;
        self.cache
            .borrow_mut()
            .add_order(order.clone(), None, Some(client_id.clone()))
            .map_err(|e| e.to_string())?;
        log::info!(
            "Adopted external order: client_order_id={}, venue_order_id={}, instrument={}",
            order.client_order_id,
            report.venue_order_id,
            report.instrument_id
        );
        Ok(order)
    }

    fn fill_from_report(&self, order: &Order, report: &FillReport) -> Option<OrderFilled> {
        let currency = self
            .cache
            .borrow()
            .instrument(&report.instrument_id)?
            .quote_currency
            .clone();
        Some(OrderFilled {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: report.venue_order_id.clone(),
            account_id: report.account_id.clone(),
            trade_id: report.trade_id.clone(),
            position_id: order.position_id.clone(),
            side: report.side,
            order_type: order.order_type,
            last_qty: report.last_qty,
            last_px: report.last_px,
            currency,
            commission: report.commission.clone(),
            liquidity_side: report.liquidity_side,
            reconciliation: false,
            ts_event: report.ts_event,
            ts_init: self.clock.now(),
        })
    }

    fn next_recon_id(&self) -> u64 {
        let n = self.recon_count.get() + 1;
        self.recon_count.set(n);
        n
    }

    fn synthetic_fill(&self, order: &Order, report: &OrderStatusReport, last_qty: Quantity, last_px: Price) -> Option<OrderFilled> {
        let (quote, settlement) = {
            let cache = self.cache.borrow();
            let instrument = cache.instrument(&report.instrument_id)?;
            (instrument.quote_currency.clone(), instrument.settlement_currency.clone())
        };
        let n = self.next_recon_id();
        Some(OrderFilled {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: report.venue_order_id.clone(),
            account_id: report.account_id.clone(),
            trade_id: TradeId::new(format!("{}-RECON-{n}", report.venue_order_id)),
            position_id: order.position_id.clone(),
            side: order.side,
            order_type: order.order_type,
            last_qty,
            last_px,
            currency: quote,
            commission: Money::zero(settlement),
            liquidity_side: LiquiditySide::NoLiquiditySide,
            reconciliation: true,
            ts_event: report.ts_last,
            ts_init: self.clock.now(),
        })
    }

    /// Reconcile the net open position of one instrument
    pub fn reconcile_position_report(&self, report: &PositionStatusReport) -> ReconciliationOutcome {
        let (open, instrument) = {
            let cache = self.cache.borrow();
            let open: Vec<Position> = cache
                .positions_open(None, Some(&report.instrument_id), None)
                .into_iter()
                .filter(|p| p.account_id == report.account_id)
                .cloned()
                .collect();
            (open, cache.instrument(&report.instrument_id).cloned())
        };

        let current_qty: Decimal = open.iter().map(|p| p.signed_qty).sum();
        let current_avg = match open.as_slice() {
            [] => None,
            [single] => Some(single.avg_px_open),
            many => {
                let total: Decimal = many.iter().map(|p| p.quantity).sum();
                (!total.is_zero()).then(|| {
                    many.iter().map(|p| p.quantity * p.avg_px_open).sum::<Decimal>() / total
                })
            }
        };

        if current_qty == report.signed_qty {
            if let (false, Some(local), Some(venue)) =
                (current_qty.is_zero(), current_avg, report.avg_px_open)
            {
                if local != venue {
                    let reason = format!(
                        "position {} quantity {} matches but average {} differs from venue {}",
                        report.instrument_id, current_qty, local, venue
                    );
                    log::error!("Cannot reconcile position: {reason}");
                    return ReconciliationOutcome::Unreconcilable(reason);
                }
            }
            return ReconciliationOutcome::InSync;
        }

        let Some(instrument) = instrument else {
            return ReconciliationOutcome::Unreconcilable(format!(
                "instrument {} not cached",
                report.instrument_id
            ));
        };
        let Some(last_px) =
            calculate_reconciliation_price(current_qty, current_avg, report.signed_qty, report.avg_px_open)
        else {
            let reason = format!(
                "no valid fill price moves {} from {} to {}",
                report.instrument_id, current_qty, report.signed_qty
            );
            log::error!("Cannot reconcile position: {reason}");
            return ReconciliationOutcome::Unreconcilable(reason);
        };

        let diff = report.signed_qty - current_qty;
        let side = if diff > Decimal::ZERO { Side::Buy } else { Side::Sell };
        let existing = open.first();
        let strategy_id = existing
            .map(|p| p.strategy_id.clone())
            .unwrap_or_else(|| StrategyId::new(EXTERNAL_STRATEGY));
        let n = self.next_recon_id();
        let client_order_id = ClientOrderId::new(format!("O-RECON-{}-{n}", report.instrument_id));
        let venue_order_id = VenueOrderId::new(format!("{}-RECON-{n}", report.instrument_id.venue));

        let init = OrderInitialized {
            trader_id: self.msgbus.trader_id().clone(),
            strategy_id: strategy_id.clone(),
            instrument_id: report.instrument_id.clone(),
            client_order_id: client_order_id.clone(),
            side,
            order_type: OrderType::Market,
            quantity: diff.abs(),
            price: None,
            trigger_price: None,
            time_in_force: TimeInForce::IOC,
            post_only: false,
            reduce_only: false,
            ts_event: report.ts_last,
            ts_init: self.clock.now(),
        };
        let order = match Order::new(init) {
            Ok(order) => order,
            Err(e) => return ReconciliationOutcome::Unreconcilable(e.to_string()),
        };
        let position_id = existing.map(|p| p.id.clone());
        if let Err(e) = self
            .cache
            .borrow_mut()
            .add_order(order.clone(), position_id.clone(), None)
        {
            return ReconciliationOutcome::Unreconcilable(e.to_string());
        }

        let mut applied = Vec::new();
        let accepted = OrderAccepted::new(&order, venue_order_id.clone(), report.account_id.clone(), report.ts_last);
        self.apply_generated(OrderEventAny::Accepted(accepted), &mut applied);

        let fill = OrderFilled {
            trader_id: order.trader_id.clone(),
            strategy_id,
            instrument_id: report.instrument_id.clone(),
            client_order_id,
            venue_order_id: venue_order_id.clone(),
            account_id: report.account_id.clone(),
            trade_id: TradeId::new(format!("{venue_order_id}-1")),
            position_id,
            side,
            order_type: OrderType::Market,
            last_qty: diff.abs(),
            last_px,
            currency: instrument.quote_currency.clone(),
            commission: Money::zero(instrument.settlement_currency.clone()),
            liquidity_side: LiquiditySide::NoLiquiditySide,
            reconciliation: true,
            ts_event: report.ts_last,
            ts_init: self.clock.now(),
        };
        log::info!(
            "Synthesized reconciliation fill: instrument={}, side={:?}, qty={}, px={}",
            report.instrument_id,
            side,
            diff.abs(),
            last_px
        );
        self.apply_generated(OrderEventAny::Filled(fill), &mut applied);

        // A reduction keeps the open average, so only the quantity converges
        let reduced = !report.signed_qty.is_zero()
            && current_qty.is_sign_positive() == report.signed_qty.is_sign_positive()
            && report.signed_qty.abs() < current_qty.abs();
        if let (true, Some(local), Some(venue)) = (reduced, current_avg, report.avg_px_open) {
            if local != venue {
                log::warn!(
                    "Position average left unreconciled after reduction: instrument={}, local_avg={}, venue_avg={}",
                    report.instrument_id,
                    local,
                    venue
                );
            }
        }
        outcome_from(applied)
    }
}

/// Price of the remainder fill that lifts an order's average to the venue's
fn synthetic_fill_price(filled: Quantity, avg_px: Option<Price>, target_filled: Quantity, target_avg: Price) -> Price {
    match avg_px {
        Some(avg) if !filled.is_zero() => {
            let px = (target_filled * target_avg - filled * avg) / (target_filled - filled);
            if px > Decimal::ZERO { px } else { target_avg }
        }
        _ => target_avg,
    }
}

fn outcome_from(applied: Vec<OrderEventAny>) -> ReconciliationOutcome {
    if applied.is_empty() {
        ReconciliationOutcome::InSync
    } else {
        ReconciliationOutcome::Applied(applied)
    }
}
