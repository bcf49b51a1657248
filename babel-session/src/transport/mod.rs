mod connection_wrapper;
mod link_event;
mod peer_transport;

pub use connection_wrapper::*;
pub use link_event::*;
pub use peer_transport::*;
