//! Host OS update orchestration

pub mod driver;
pub mod fsm;
pub mod status;
pub mod version;
