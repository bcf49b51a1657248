pub use babel_core::model::{Identity, LanguageTag, Participant, ParticipantId, RoomId};

pub mod model {
    pub use babel_core::model::*;
    pub use babel_core::utils::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use babel_session::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use babel_relay::*;
}
