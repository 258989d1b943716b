//! Cache errors

use tessera_core::{AccountId, ClientOrderId, PositionId, VenueOrderId};
use tessera_ports::BackendError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Order ids are unique for the lifetime of the cache
    #[error("Duplicate order: {0}")]
    DuplicateOrder(ClientOrderId),

    #[error("Duplicate position: {0}")]
    DuplicatePosition(PositionId),

    #[error("Order not found: {0}")]
    OrderNotFound(ClientOrderId),

    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Venue order id {venue_order_id} already belongs to {owner}, not {client_order_id}")]
    VenueOrderIdConflict {
        venue_order_id: VenueOrderId,
        owner: ClientOrderId,
        client_order_id: ClientOrderId,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
