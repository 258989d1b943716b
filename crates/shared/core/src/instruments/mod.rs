//! Instrument definitions for tradeable contracts
//!
//! - Spot pairs (BTCUSDT.SIM)
//! - Perpetuals (ETHUSDT-PERP.SIM)
//! - Dated futures

mod instrument;
mod spec;

pub use instrument::{Instrument, InstrumentKind};
pub use spec::InstrumentSpec;
