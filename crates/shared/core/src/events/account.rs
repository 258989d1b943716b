use serde::{Deserialize, Serialize};

use crate::entities::{AccountBalance, AccountType, MarginBalance};
use crate::identifiers::AccountId;
use crate::values::{Currency, Timestamp};

/// Full account state as reported by a venue or derived locally from fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub base_currency: Option<Currency>,
    pub balances: Vec<AccountBalance>,
    pub margins: Vec<MarginBalance>,
    /// True when the state came from the venue rather than local calculation
    pub is_reported: bool,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}
