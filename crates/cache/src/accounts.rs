//! Account balance and margin bookkeeping
//!
//! Derives the next [`AccountState`] of a venue account from the cache after
//! a fill or an order change. Balances move only on fills; locked amounts
//! and margins are recalculated from open orders and open positions.
//!
//! | Account | Fill cash flow                                    | Locked                          |
//! |---------|---------------------------------------------------|---------------------------------|
//! | Cash    | spot: quote -= signed notional, base += signed qty | open buys (quote), sells (base) |
//! | Margin  | settlement += realized P&L delta                   | initial + maintenance margin    |

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use tessera_core::events::{AccountState, OrderFilled};
use tessera_core::{
    Account, AccountBalance, AccountId, AccountType, Currency, Instrument, InstrumentId,
    MarginBalance, Side, Timestamp,
};

use crate::cache::Cache;

/// Account state after applying `fill`
///
/// `realized_pnl_delta` is the change of the position's realized P&L caused
/// by this fill (commission included when it settles in the same currency).
/// Returns `None` when the account or instrument is unknown.
pub fn state_after_fill(
    cache: &Cache,
    account_id: &AccountId,
    fill: &OrderFilled,
    realized_pnl_delta: Decimal,
    ts: Timestamp,
) -> Option<AccountState> {
    let account = cache.account(account_id)?;
    let instrument = cache.instrument(&fill.instrument_id)?;

    let mut totals: BTreeMap<Currency, Decimal> = account
        .balances
        .values()
        .map(|b| (b.currency.clone(), b.total))
        .collect();

    let commission = &fill.commission;
    match (account.account_type, &instrument.base_currency) {
        (AccountType::Cash, Some(base)) => {
            let notional = instrument.notional_value(fill.last_qty, fill.last_px);
            let sign = fill.side.sign();
            *totals.entry(instrument.quote_currency.clone()).or_default() -= sign * notional;
            *totals.entry(base.clone()).or_default() += sign * fill.last_qty;
            *totals.entry(commission.currency.clone()).or_default() -= commission.amount;
        }
        _ => {
            let settlement = &instrument.settlement_currency;
            *totals.entry(settlement.clone()).or_default() += realized_pnl_delta;
            if &commission.currency != settlement {
                *totals.entry(commission.currency.clone()).or_default() -= commission.amount;
            }
        }
    }

    Some(build_state(cache, account, totals, ts))
}

/// Account state after open orders or positions changed without a fill
pub fn state_after_order_change(
    cache: &Cache,
    account_id: &AccountId,
    ts: Timestamp,
) -> Option<AccountState> {
    let account = cache.account(account_id)?;
    let totals: BTreeMap<Currency, Decimal> = account
        .balances
        .values()
        .map(|b| (b.currency.clone(), b.total))
        .collect();
    let state = build_state(cache, account, totals, ts);

    let unchanged = state.balances.iter().all(|b| account.balance(&b.currency) == Some(b))
        && state
            .margins
            .iter()
            .all(|m| account.margins.get(&m.instrument_id) == Some(m));
    (!unchanged).then_some(state)
}

fn build_state(
    cache: &Cache,
    account: &Account,
    totals: BTreeMap<Currency, Decimal>,
    ts: Timestamp,
) -> AccountState {
    let venue = account.id.venue();
    let margins = match account.account_type {
        AccountType::Margin => calculate_margins(cache, account, &venue),
        AccountType::Cash => Vec::new(),
    };
    let locked = match account.account_type {
        AccountType::Margin => {
            let mut locked: HashMap<Currency, Decimal> = HashMap::new();
            for margin in &margins {
                *locked.entry(margin.currency.clone()).or_default() +=
                    margin.initial + margin.maintenance;
            }
            locked
        }
        AccountType::Cash => calculate_cash_locked(cache, &venue),
    };

    let balances: Vec<AccountBalance> = totals
        .into_iter()
        .map(|(currency, total)| {
            let locked = locked.get(&currency).copied().unwrap_or_default();
            let balance = AccountBalance::new(currency, total, locked);
            if balance.free < Decimal::ZERO {
                log::warn!(
                    "Account balance below locked: account={}, currency={}, total={}, locked={}",
                    account.id,
                    balance.currency,
                    balance.total,
                    balance.locked
                );
            }
            balance
        })
        .collect();

    AccountState {
        account_id: account.id.clone(),
        account_type: account.account_type,
        base_currency: account.base_currency.clone(),
        balances,
        margins,
        is_reported: false,
        ts_event: ts,
        ts_init: ts,
    }
}

fn calculate_margins(
    cache: &Cache,
    account: &Account,
    venue: &tessera_core::Venue,
) -> Vec<MarginBalance> {
    let mut margins: BTreeMap<InstrumentId, MarginBalance> = BTreeMap::new();

    for order in cache.orders_open(Some(venue), None, None, None) {
        let Some(instrument) = cache.instrument(&order.instrument_id) else {
            continue;
        };
        let Some(price) = order.price.or(order.trigger_price) else {
            continue;
        };
        let notional = instrument.notional_value(order.leaves_qty, price);
        margin_entry(&mut margins, instrument).initial += notional * instrument.margin_init;
    }

    for position in cache.positions_open(Some(venue), None, None) {
        let Some(instrument) = cache.instrument(&position.instrument_id) else {
            continue;
        };
        let notional = instrument.notional_value(position.quantity, position.avg_px_open);
        margin_entry(&mut margins, instrument).maintenance += notional * instrument.margin_maint;
    }

    // Zeroed entries clear margins of instruments no longer held
    for instrument_id in account.margins.keys() {
        if let Some(instrument) = cache.instrument(instrument_id) {
            margin_entry(&mut margins, instrument);
        }
    }

    margins.into_values().collect()
}

fn margin_entry<'a>(
    margins: &'a mut BTreeMap<InstrumentId, MarginBalance>,
    instrument: &Instrument,
) -> &'a mut MarginBalance {
    margins
        .entry(instrument.id.clone())
        .or_insert_with(|| MarginBalance {
            instrument_id: instrument.id.clone(),
            currency: instrument.settlement_currency.clone(),
            initial: Decimal::ZERO,
            maintenance: Decimal::ZERO,
        })
}

fn calculate_cash_locked(cache: &Cache, venue: &tessera_core::Venue) -> HashMap<Currency, Decimal> {
    let mut locked: HashMap<Currency, Decimal> = HashMap::new();
    for order in cache.orders_open(Some(venue), None, None, None) {
        let Some(instrument) = cache.instrument(&order.instrument_id) else {
            continue;
        };
        match order.side {
            Side::Buy => {
                if let Some(price) = order.price.or(order.trigger_price) {
                    *locked.entry(instrument.quote_currency.clone()).or_default() +=
                        instrument.notional_value(order.leaves_qty, price);
                }
            }
            Side::Sell => {
                if let Some(base) = &instrument.base_currency {
                    *locked.entry(base.clone()).or_default() += order.leaves_qty;
                }
            }
        }
    }
    locked
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_core::events::{OrderAccepted, OrderEventAny, OrderSubmitted};
    use tessera_core::{Money, VenueOrderId, stubs};

    fn account(account_type: AccountType, balances: Vec<AccountBalance>) -> Account {
        Account::new(AccountState {
            account_id: stubs::account_id(),
            account_type,
            base_currency: None,
            balances,
            margins: Vec::new(),
            is_reported: true,
            ts_event: stubs::ts(0),
            ts_init: stubs::ts(0),
        })
    }

    fn cache_with(account: Account, instrument: Instrument) -> Cache {
        let mut cache = Cache::default();
        cache.add_instrument(instrument).unwrap();
        cache.add_account(account).unwrap();
        cache
    }

    #[test]
    fn test_cash_buy_moves_quote_to_base() {
        let cache = cache_with(
            account(
                AccountType::Cash,
                vec![AccountBalance::new(Currency::usdt(), dec!(10000), dec!(0))],
            ),
            stubs::btcusdt(),
        );
        let mut fill = stubs::order_filled(Side::Buy, dec!(2), dec!(100), "T-1");
        fill.commission = Money::new(dec!(0.1), Currency::usdt());

        let state =
            state_after_fill(&cache, &stubs::account_id(), &fill, dec!(-0.1), stubs::ts(1)).unwrap();

        let usdt = state
            .balances
            .iter()
            .find(|b| b.currency == Currency::usdt())
            .unwrap();
        let btc = state
            .balances
            .iter()
            .find(|b| b.currency == Currency::btc())
            .unwrap();
        assert_eq!(usdt.total, dec!(9799.9));
        assert_eq!(btc.total, dec!(2));
        assert!(!state.is_reported);
    }

    #[test]
    fn test_margin_account_settles_realized_pnl_and_locks_margin() {
        let perp = stubs::ethusdt_perp();
        let mut cache = cache_with(
            account(
                AccountType::Margin,
                vec![AccountBalance::new(Currency::usdt(), dec!(1000), dec!(0))],
            ),
            perp.clone(),
        );

        // Resting limit order for 1 @ 100 locks 10% initial margin
        let mut init = stubs::order_init(
            "O-2",
            Side::Buy,
            tessera_core::OrderType::Limit,
            dec!(1),
            Some(dec!(100)),
        );
        init.instrument_id = perp.id.clone();
        let mut order = tessera_core::Order::new(init).unwrap();
        let submitted = OrderSubmitted::new(&order, stubs::account_id(), stubs::ts(1));
        order.apply(OrderEventAny::Submitted(submitted)).unwrap();
        let accepted = OrderAccepted::new(
            &order,
            VenueOrderId::new("SIM-1-1"),
            stubs::account_id(),
            stubs::ts(1),
        );
        order.apply(OrderEventAny::Accepted(accepted)).unwrap();
        cache.add_order(order, None, None).unwrap();

        let mut fill = stubs::order_filled(Side::Sell, dec!(1), dec!(100), "T-9");
        fill.instrument_id = perp.id.clone();
        let state =
            state_after_fill(&cache, &stubs::account_id(), &fill, dec!(25), stubs::ts(2)).unwrap();

        assert_eq!(state.balances.len(), 1);
        assert_eq!(state.balances[0].total, dec!(1025));
        assert_eq!(state.balances[0].locked, dec!(10.0));
        assert_eq!(state.balances[0].free, dec!(1015.0));
        assert_eq!(state.margins.len(), 1);
        assert_eq!(state.margins[0].initial, dec!(10.0));
    }

    #[test]
    fn test_unchanged_order_state_yields_none() {
        let cache = cache_with(
            account(
                AccountType::Cash,
                vec![AccountBalance::new(Currency::usdt(), dec!(100), dec!(0))],
            ),
            stubs::btcusdt(),
        );
        assert!(state_after_order_change(&cache, &stubs::account_id(), stubs::ts(1)).is_none());
    }

    #[test]
    fn test_unknown_account_yields_none() {
        let cache = Cache::default();
        let fill = stubs::order_filled(Side::Buy, dec!(1), dec!(1), "T-1");
        assert!(
            state_after_fill(&cache, &AccountId::new("X-1"), &fill, dec!(0), stubs::ts(1))
                .is_none()
        );
    }
}
