use babel_core::ParticipantId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("participant id {0} is already connected")]
    IdInUse(ParticipantId),
}
