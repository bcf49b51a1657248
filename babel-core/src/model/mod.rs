mod candidate;
mod language;
mod participant;
mod room;
mod signaling;

pub use candidate::Candidate;
pub use language::LanguageTag;
pub use participant::{Identity, Participant, ParticipantId};
pub use room::RoomId;
pub use signaling::{ClientMessage, IceServerConfig, RelayMessage};
