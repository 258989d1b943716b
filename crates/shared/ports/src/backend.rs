use tessera_core::{Account, Instrument, Order, Position};

use crate::error::BackendError;

/// Port for cache persistence
///
/// Writes are keyed by entity id. Only eventual read-your-writes consistency
/// is required: a `load_*` after `add_*`/`update_*` must eventually observe
/// the write.
pub trait CacheBackend {
    fn add_instrument(&self, instrument: &Instrument) -> Result<(), BackendError>;

    fn add_order(&self, order: &Order) -> Result<(), BackendError>;

    fn update_order(&self, order: &Order) -> Result<(), BackendError>;

    fn add_position(&self, position: &Position) -> Result<(), BackendError>;

    fn update_position(&self, position: &Position) -> Result<(), BackendError>;

    fn add_account(&self, account: &Account) -> Result<(), BackendError>;

    fn update_account(&self, account: &Account) -> Result<(), BackendError>;

    fn load_instruments(&self) -> Result<Vec<Instrument>, BackendError>;

    fn load_orders(&self) -> Result<Vec<Order>, BackendError>;

    fn load_positions(&self) -> Result<Vec<Position>, BackendError>;

    fn load_accounts(&self) -> Result<Vec<Account>, BackendError>;

    /// Drop everything stored
    fn flush(&self) -> Result<(), BackendError>;
}
