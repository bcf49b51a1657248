mod relay_error;
mod relay_hub;

pub use relay_error::*;
pub use relay_hub::*;
