//! In-memory cache backend
//!
//! Stores every entity as a JSON snapshot in a [`DashMap`] keyed by id. It
//! stands in for an external key-value store: writes are visible to the next
//! `load_*` and survive a [`crate::Cache::reset`], so a cache can be rebuilt
//! with [`crate::Cache::cache_all`].

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tessera_core::{Account, Instrument, Order, Position};
use tessera_ports::{BackendError, CacheBackend};

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    instruments: DashMap<String, String>,
    orders: DashMap<String, String>,
    positions: DashMap<String, String>,
    accounts: DashMap<String, String>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities across all kinds
    pub fn len(&self) -> usize {
        self.instruments.len() + self.orders.len() + self.positions.len() + self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn put<T: Serialize>(map: &DashMap<String, String>, key: String, value: &T) -> Result<(), BackendError> {
    let json = serde_json::to_string(value).map_err(|e| BackendError::Serialization(e.to_string()))?;
    map.insert(key, json);
    Ok(())
}

fn load<T: DeserializeOwned>(map: &DashMap<String, String>) -> Result<Vec<T>, BackendError> {
    let mut entries: Vec<(String, String)> = map
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .into_iter()
        .map(|(_, json)| {
            serde_json::from_str(&json).map_err(|e| BackendError::Serialization(e.to_string()))
        })
        .collect()
}

impl CacheBackend for InMemoryBackend {
    fn add_instrument(&self, instrument: &Instrument) -> Result<(), BackendError> {
        put(&self.instruments, instrument.id.to_string(), instrument)
    }

    fn add_order(&self, order: &Order) -> Result<(), BackendError> {
        put(&self.orders, order.client_order_id.to_string(), order)
    }

    fn update_order(&self, order: &Order) -> Result<(), BackendError> {
        put(&self.orders, order.client_order_id.to_string(), order)
    }

    fn add_position(&self, position: &Position) -> Result<(), BackendError> {
        put(&self.positions, position.id.to_string(), position)
    }

    fn update_position(&self, position: &Position) -> Result<(), BackendError> {
        put(&self.positions, position.id.to_string(), position)
    }

    fn add_account(&self, account: &Account) -> Result<(), BackendError> {
        put(&self.accounts, account.id.to_string(), account)
    }

    fn update_account(&self, account: &Account) -> Result<(), BackendError> {
        put(&self.accounts, account.id.to_string(), account)
    }

    fn load_instruments(&self) -> Result<Vec<Instrument>, BackendError> {
        load(&self.instruments)
    }

    fn load_orders(&self) -> Result<Vec<Order>, BackendError> {
        load(&self.orders)
    }

    fn load_positions(&self) -> Result<Vec<Position>, BackendError> {
        load(&self.positions)
    }

    fn load_accounts(&self) -> Result<Vec<Account>, BackendError> {
        load(&self.accounts)
    }

    fn flush(&self) -> Result<(), BackendError> {
        self.instruments.clear();
        self.orders.clear();
        self.positions.clear();
        self.accounts.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_core::{Side, stubs};

    #[test]
    fn test_orders_roundtrip_sorted_by_id() {
        let backend = InMemoryBackend::new();
        backend
            .add_order(&stubs::market_order("O-2", Side::Buy, dec!(1)))
            .unwrap();
        backend
            .add_order(&stubs::limit_order("O-1", Side::Sell, dec!(2), dec!(100)))
            .unwrap();

        let orders = backend.load_orders().unwrap();
        let ids: Vec<&str> = orders.iter().map(|o| o.client_order_id.as_str()).collect();
        assert_eq!(ids, vec!["O-1", "O-2"]);
        assert_eq!(orders[0].price, Some(dec!(100)));
    }

    #[test]
    fn test_update_overwrites_and_flush_clears() {
        let backend = InMemoryBackend::new();
        let instrument = stubs::btcusdt();
        backend.add_instrument(&instrument).unwrap();
        backend.add_instrument(&instrument).unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.load_instruments().unwrap(), vec![instrument]);

        backend.flush().unwrap();
        assert!(backend.is_empty());
    }
}
