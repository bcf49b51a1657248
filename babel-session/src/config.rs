use babel_core::IceServerConfig;
use babel_core::utils::DEFAULT_STUN_ADDR;
use std::time::Duration;

/// Tunables of a session and of every peer link it supervises.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// STUN servers handed to every peer transport. No TURN.
    pub ice_servers: Vec<IceServerConfig>,
    /// How long a link may sit in `OfferSent`/`AnswerExchanged`.
    pub negotiation_timeout: Duration,
    /// How long `join` waits for the relay's welcome.
    pub join_timeout: Duration,
    /// Fresh-transport retries before a peer is reported unreachable.
    pub max_offer_retries: u32,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
            negotiation_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(5),
            max_offer_retries: 1,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_max_offer_retries(mut self, retries: u32) -> Self {
        self.max_offer_retries = retries;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}
