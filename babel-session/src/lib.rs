mod captions;
mod config;
mod error;
mod link;
mod media;
mod membership;
mod session;
mod signaling;
mod transport;

pub use captions::*;
pub use config::*;
pub use error::*;
pub use link::*;
pub use media::*;
pub use membership::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
