use crate::link::PeerLink;
use anyhow::{Result, anyhow, ensure};
use babel_core::{Candidate, ClientMessage};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    OfferSent,
    OfferReceived,
    AnswerExchanged,
    Established,
    Closed,
}

impl NegotiationState {
    /// States that wait on the remote side and therefore carry a deadline.
    pub fn awaits_remote(&self) -> bool {
        matches!(
            self,
            NegotiationState::OfferSent
                | NegotiationState::OfferReceived
                | NegotiationState::AnswerExchanged
        )
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Offer/answer/candidate rules for one link.
///
/// Outbound messages are returned, not sent, so the caller decides whether
/// the link is still wanted by the time they go out.
impl PeerLink {
    pub(crate) fn transition(&mut self, next: NegotiationState) {
        if self.state != next {
            debug!("Link {}: {} -> {}", self.peer_id, self.state, next);
            self.state = next;
        }
    }

    /// Idle initiator: create and apply the local offer.
    pub(crate) async fn start_offer(&mut self) -> Result<ClientMessage> {
        ensure!(
            self.state == NegotiationState::Idle,
            "cannot offer to {} from {}",
            self.peer_id,
            self.state
        );
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| anyhow!("no transport toward {}", self.peer_id))?;

        let sdp = transport.create_offer().await?;
        self.transition(NegotiationState::OfferSent);

        Ok(ClientMessage::Offer {
            target: self.peer_id.clone(),
            sdp,
        })
    }

    /// Idle responder: apply the remote offer, flush queued candidates and
    /// answer.
    pub(crate) async fn accept_offer(&mut self, sdp: String) -> Result<ClientMessage> {
        ensure!(
            self.state == NegotiationState::Idle,
            "cannot accept an offer from {} in {}",
            self.peer_id,
            self.state
        );
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| anyhow!("no transport toward {}", self.peer_id))?;

        transport.set_remote_offer(sdp).await?;
        self.remote_description_set = true;
        self.transition(NegotiationState::OfferReceived);
        self.flush_candidates().await;

        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| anyhow!("no transport toward {}", self.peer_id))?;
        let answer = transport.create_answer().await?;
        self.transition(NegotiationState::AnswerExchanged);

        Ok(ClientMessage::Answer {
            target: self.peer_id.clone(),
            sdp: answer,
        })
    }

    pub(crate) async fn accept_answer(&mut self, sdp: String) -> Result<()> {
        ensure!(
            self.state == NegotiationState::OfferSent,
            "unexpected answer from {} in {}",
            self.peer_id,
            self.state
        );
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| anyhow!("no transport toward {}", self.peer_id))?;

        transport.set_remote_answer(sdp).await?;
        self.remote_description_set = true;
        self.transition(NegotiationState::AnswerExchanged);
        self.flush_candidates().await;
        Ok(())
    }

    /// Apply now if the remote description is set, otherwise queue.
    pub(crate) async fn receive_candidate(&mut self, candidate: Candidate) {
        match self.transport.as_ref() {
            Some(transport) if self.remote_description_set => {
                if let Err(e) = transport.add_remote_candidate(candidate).await {
                    warn!("Candidate from {} rejected: {:?}", self.peer_id, e);
                }
            }
            _ => {
                self.pending_remote_candidates.push_back(candidate);
                debug!(
                    "Queued candidate from {} ({} pending)",
                    self.peer_id,
                    self.pending_remote_candidates.len()
                );
            }
        }
    }

    /// Each queued candidate is applied once, in arrival order.
    async fn flush_candidates(&mut self) {
        let Some(transport) = self.transport.as_ref() else {
            return;
        };
        if !self.pending_remote_candidates.is_empty() {
            debug!(
                "Flushing {} queued candidates for {}",
                self.pending_remote_candidates.len(),
                self.peer_id
            );
        }
        while let Some(candidate) = self.pending_remote_candidates.pop_front() {
            if let Err(e) = transport.add_remote_candidate(candidate).await {
                warn!("Queued candidate from {} rejected: {:?}", self.peer_id, e);
            }
        }
    }

    /// Returns true when the link just became Established.
    pub(crate) fn mark_connected(&mut self) -> bool {
        if self.state != NegotiationState::AnswerExchanged {
            return false;
        }
        self.transition(NegotiationState::Established);
        self.deadline = None;
        true
    }
}
