pub mod config;
pub mod diff;
pub mod error;
pub mod io;
pub mod normalize;
pub mod paths;
pub mod schedule;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod watchdog;

pub use error::{CoreError, Result};
