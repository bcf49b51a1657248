mod negotiation;
mod peer_link;
mod supervisor;

pub use negotiation::*;
pub use peer_link::*;
pub use supervisor::*;
