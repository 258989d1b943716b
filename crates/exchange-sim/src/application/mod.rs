mod exchange;

pub use exchange::SimulatedExchange;
