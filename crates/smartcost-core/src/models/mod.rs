//! Data models for SmartCost

mod alert;
mod cost;
mod dashboard;

pub use alert::*;
pub use cost::*;
pub use dashboard::*;
