use async_trait::async_trait;
use babel_core::{ClientMessage, ParticipantId, RelayMessage};
use babel_relay::RelayHub;
use babel_session::{SignalingTransport, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Signaling wired straight into an in-process relay hub under a fixed id.
pub struct LocalRelayTransport {
    hub: RelayHub,
    id: ParticipantId,
    connected: AtomicBool,
}

impl LocalRelayTransport {
    pub fn new(hub: RelayHub, id: &str) -> Self {
        Self {
            hub,
            id: ParticipantId::from(id),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SignalingTransport for LocalRelayTransport {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<RelayMessage>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub
            .connect_as(self.id.clone(), tx)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, msg: ClientMessage) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.hub.handle(&self.id, msg);
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.hub.disconnect(&self.id);
        }
    }
}
