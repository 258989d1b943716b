mod account;
mod fee;
mod order;
mod order_status;
mod order_type;
mod position;
mod side;
mod time_in_force;

pub use account::{Account, AccountBalance, AccountType, MarginBalance, OmsType};
pub use fee::FeeSchedule;
pub use order::Order;
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::{Position, PositionSide};
pub use side::{AggressorSide, LiquiditySide, Side};
pub use time_in_force::TimeInForce;
