//! Budget alerting for SmartCost
//!
//! Month-to-date threshold evaluation and email notification delivery.

mod dispatcher;
mod evaluator;
mod repository;

pub use dispatcher::{AlertDispatcher, DispatchResult};
pub use evaluator::AlertEvaluator;
pub use repository::AlertRepository;
