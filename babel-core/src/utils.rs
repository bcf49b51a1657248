/// Public STUN server used when no ICE servers are configured.
pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Room id used by the CLI when none is given.
pub const DEFAULT_ROOM: &str = "lobby";

/// Language assumed for participants whose metadata has not arrived yet.
pub const FALLBACK_LANGUAGE: &str = "en-US";
