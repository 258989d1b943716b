use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_core::{AccountId, AccountType, Currency, Money, OmsType, Venue};
use tessera_matching::{FeeModel, FillModelConfig, MatchingEngineConfig};

/// Everything needed to stand up one simulated venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedVenueConfig {
    pub venue: Venue,
    pub oms_type: OmsType,
    pub account_type: AccountType,
    /// Single-currency accounts report every balance in this currency
    pub base_currency: Option<Currency>,
    pub starting_balances: Vec<Money>,
    pub fill_model: FillModelConfig,
    pub fee_model: FeeModel,
    pub matching: MatchingEngineConfig,
}

impl SimulatedVenueConfig {
    /// Account id the venue reports: `{venue}-001`
    pub fn account_id(&self) -> AccountId {
        AccountId::new(format!("{}-001", self.venue))
    }
}

impl Default for SimulatedVenueConfig {
    fn default() -> Self {
        Self {
            venue: Venue::new("SIM"),
            oms_type: OmsType::Netting,
            account_type: AccountType::Cash,
            base_currency: None,
            starting_balances: vec![Money::new(Decimal::from(1_000_000), Currency::usdt())],
            fill_model: FillModelConfig::default(),
            fee_model: FeeModel::default(),
            matching: MatchingEngineConfig::default(),
        }
    }
}
