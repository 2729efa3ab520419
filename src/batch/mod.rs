pub mod aggregation;
pub mod collector;
pub mod dispatcher;
pub mod error_handling;
pub mod executor;
pub mod types;
pub mod worker;

pub use aggregation::*;
pub use collector::*;
pub use dispatcher::*;
pub use error_handling::*;
pub use executor::*;
pub use types::*;
pub use worker::*;
