use tessera_core::commands::{CancelAllOrders, CancelOrder, ModifyOrder, SubmitOrder};
use tessera_core::reports::ExecutionMassStatus;
use tessera_core::{AccountId, ClientId, OmsType, Venue};

use crate::error::ClientError;

/// Port for order routing adapters
///
/// Order events produced by the venue are delivered back through the message
/// bus (`ExecEngine.process` endpoint). A returned `Err` means the command was
/// not sent; the engine leaves the cache untouched and relies on the next
/// state report.
pub trait ExecutionClient {
    fn client_id(&self) -> &ClientId;

    fn venue(&self) -> &Venue;

    fn account_id(&self) -> &AccountId;

    fn oms_type(&self) -> OmsType;

    fn connect(&self) -> Result<(), ClientError>;

    fn disconnect(&self) -> Result<(), ClientError>;

    fn is_connected(&self) -> bool;

    fn submit_order(&self, cmd: &SubmitOrder) -> Result<(), ClientError>;

    fn modify_order(&self, cmd: &ModifyOrder) -> Result<(), ClientError>;

    fn cancel_order(&self, cmd: &CancelOrder) -> Result<(), ClientError>;

    fn cancel_all_orders(&self, cmd: &CancelAllOrders) -> Result<(), ClientError>;

    /// Snapshot of the venue's view of orders, fills and positions
    fn generate_mass_status(&self) -> Result<ExecutionMassStatus, ClientError>;
}
