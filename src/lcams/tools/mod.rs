pub mod coerce;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod store;
pub mod sync;

pub use error::{Result, ToolError};
