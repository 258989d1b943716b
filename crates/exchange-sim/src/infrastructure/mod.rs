mod data_client;
mod execution_client;

pub use data_client::BacktestDataClient;
pub use execution_client::BacktestExecutionClient;
