use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AccountError;
use crate::events::AccountState;
use crate::identifiers::{AccountId, InstrumentId};
use crate::values::{Currency, Timestamp};

/// Type of account held at a venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Fully funded: buys debit the quote currency and credit the base
    Cash,
    /// Leveraged: P&L and commissions settle to the settlement currency
    Margin,
}

/// How the venue nets fills into positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OmsType {
    /// One position per instrument and strategy
    Netting,
    /// One position per opening order
    Hedging,
}

/// Balance in one currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountBalance {
    pub currency: Currency,
    pub total: Decimal,
    pub locked: Decimal,
    pub free: Decimal,
}

impl AccountBalance {
    pub fn new(currency: Currency, total: Decimal, locked: Decimal) -> Self {
        Self {
            currency,
            total,
            locked,
            free: total - locked,
        }
    }
}

/// Margin held against one instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarginBalance {
    pub instrument_id: InstrumentId,
    pub currency: Currency,
    pub initial: Decimal,
    pub maintenance: Decimal,
}

/// Account for tracking per-currency balances and margins
///
/// Mutated only through [`Account::apply`] with an [`AccountState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_type: AccountType,
    pub base_currency: Option<Currency>,
    pub balances: HashMap<Currency, AccountBalance>,
    pub margins: HashMap<InstrumentId, MarginBalance>,
    pub events: Vec<AccountState>,
    pub ts_last: Timestamp,
}

impl Account {
    /// Create an account from its first state
    pub fn new(state: AccountState) -> Self {
        let mut account = Self {
            id: state.account_id.clone(),
            account_type: state.account_type,
            base_currency: state.base_currency.clone(),
            balances: HashMap::new(),
            margins: HashMap::new(),
            events: Vec::new(),
            ts_last: state.ts_event,
        };
        account.update_from(state);
        account
    }

    /// Apply a new account state
    pub fn apply(&mut self, state: AccountState) -> Result<(), AccountError> {
        if state.account_id != self.id {
            return Err(AccountError::MismatchedAccount {
                account: self.id.clone(),
                event: state.account_id,
            });
        }
        self.update_from(state);
        Ok(())
    }

    fn update_from(&mut self, state: AccountState) {
        for balance in &state.balances {
            self.balances
                .insert(balance.currency.clone(), balance.clone());
        }
        for margin in &state.margins {
            self.margins
                .insert(margin.instrument_id.clone(), margin.clone());
        }
        self.ts_last = state.ts_event;
        self.events.push(state);
    }

    pub fn balance(&self, currency: &Currency) -> Option<&AccountBalance> {
        self.balances.get(currency)
    }

    pub fn balance_total(&self, currency: &Currency) -> Decimal {
        self.balances
            .get(currency)
            .map(|b| b.total)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn balance_free(&self, currency: &Currency) -> Decimal {
        self.balances
            .get(currency)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn last_state(&self) -> Option<&AccountState> {
        self.events.last()
    }

    /// Current state as a snapshot event, used to derive the next state
    pub fn snapshot(&self, ts: Timestamp) -> AccountState {
        let mut balances: Vec<AccountBalance> = self.balances.values().cloned().collect();
        balances.sort_by(|a, b| a.currency.cmp(&b.currency));
        let mut margins: Vec<MarginBalance> = self.margins.values().cloned().collect();
        margins.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        AccountState {
            account_id: self.id.clone(),
            account_type: self.account_type,
            base_currency: self.base_currency.clone(),
            balances,
            margins,
            is_reported: false,
            ts_event: ts,
            ts_init: ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn state(total: Decimal) -> AccountState {
        AccountState {
            account_id: AccountId::new("SIM-001"),
            account_type: AccountType::Cash,
            base_currency: None,
            balances: vec![AccountBalance::new(Currency::usdt(), total, dec!(0))],
            margins: vec![],
            is_reported: true,
            ts_event: Utc::now(),
            ts_init: Utc::now(),
        }
    }

    #[test]
    fn test_account_applies_states() {
        let mut account = Account::new(state(dec!(1000)));
        assert_eq!(account.balance_total(&Currency::usdt()), dec!(1000));

        account.apply(state(dec!(900))).unwrap();
        assert_eq!(account.balance_free(&Currency::usdt()), dec!(900));
        assert_eq!(account.events.len(), 2);
    }

    #[test]
    fn test_account_rejects_foreign_state() {
        let mut account = Account::new(state(dec!(1000)));
        let mut other = state(dec!(1));
        other.account_id = AccountId::new("SIM-002");

        assert!(account.apply(other).is_err());
        assert_eq!(account.balance_total(&Currency::usdt()), dec!(1000));
    }
}
