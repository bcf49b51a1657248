mod config;
mod hub;
mod signaling;

pub use config::*;
pub use hub::*;
pub use signaling::*;
