mod local_relay;
mod mock_transport;

pub use event_log::*;
pub use local_relay::*;
pub use mock_captions::*;
pub use mock_renderer::*;
pub use mock_signaling::*;
pub use mock_transport::*;
