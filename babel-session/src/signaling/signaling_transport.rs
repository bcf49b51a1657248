use crate::error::TransportError;
use async_trait::async_trait;
use babel_core::{ClientMessage, RelayMessage};
use tokio::sync::mpsc;

/// Bidirectional channel between this client and the relay.
///
/// Delivery must be reliable and in order; the relay's per-socket delivery
/// provides that.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Open the channel. Relay messages arrive on the returned receiver,
    /// which ends when the relay connection is lost.
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<RelayMessage>, TransportError>;

    async fn send(&self, msg: ClientMessage) -> Result<(), TransportError>;

    /// Close the channel. Calling it twice is harmless.
    async fn disconnect(&self);
}
