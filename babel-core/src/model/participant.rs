use crate::model::language::LanguageTag;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Connection-scoped participant identifier.
///
/// Ids made only of digits compare numerically and sort before every other
/// id; everything else compares lexically. The ordering is total, which is
/// what the offer tie-break relies on.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this side sends the offer on a link toward `remote`.
    pub fn initiates_toward(&self, remote: &ParticipantId) -> bool {
        self > remote
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Ord for ParticipantId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ParticipantId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a participant announces about itself on join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: String,
    pub spoken_language: LanguageTag,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, spoken_language: impl Into<LanguageTag>) -> Self {
        Self {
            display_name: display_name.into(),
            spoken_language: spoken_language.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub spoken_language: LanguageTag,
}

impl Participant {
    pub fn new(id: ParticipantId, identity: Identity) -> Self {
        Self {
            id,
            display_name: identity.display_name,
            spoken_language: identity.spoken_language,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            display_name: self.display_name.clone(),
            spoken_language: self.spoken_language.clone(),
        }
    }
}
