use anyhow::Result;
use async_trait::async_trait;
use babel_core::{LanguageTag, ParticipantId};
use babel_session::{MediaRenderer, RemoteStream, SessionEvent, Speaker};
use colored::*;

/// Prints remote streams instead of playing them.
pub struct ConsoleRenderer;

impl MediaRenderer for ConsoleRenderer {
    fn render_remote_stream(&self, peer_id: &ParticipantId, stream: RemoteStream) {
        let kinds: Vec<&str> = stream.tracks.iter().map(|t| t.kind.as_str()).collect();
        println!("{} {} [{}]", "▶ media from".blue(), peer_id, kinds.join(", "));
    }

    fn remove_remote_stream(&self, peer_id: &ParticipantId) {
        println!("{} {}", "■ media gone from".blue(), peer_id);
    }
}

/// "Speaks" by printing.
pub struct ConsoleSpeaker;

#[async_trait]
impl Speaker for ConsoleSpeaker {
    async fn speak(&self, text: &str, lang: &LanguageTag) -> Result<()> {
        println!("{} ({}) {}", "🔊".bold(), lang, text.italic());
        Ok(())
    }

    fn cancel(&self) {}
}

pub fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Joined { local_id, room_id } => {
            println!("{} {} as {}", "joined".green(), room_id, local_id)
        }
        SessionEvent::MemberAdded(p) => println!(
            "{} {} ({}, speaks {})",
            "+".green().bold(),
            p.display_name,
            p.id,
            p.spoken_language
        ),
        SessionEvent::MemberUpdated(p) => println!(
            "{} {} ({}, speaks {})",
            "~".yellow().bold(),
            p.display_name,
            p.id,
            p.spoken_language
        ),
        SessionEvent::MemberRemoved(p) => {
            println!("{} {} ({})", "-".red().bold(), p.display_name, p.id)
        }
        SessionEvent::LinkStateChanged { peer_id, state } => {
            println!("{}", format!("  link {peer_id}: {state}").dimmed())
        }
        SessionEvent::LinkEstablished { peer_id, .. } => {
            println!("{} {}", "linked with".green(), peer_id)
        }
        SessionEvent::LinkFailed {
            peer_id,
            error,
            retrying,
        } => {
            let note = if *retrying { "retrying" } else { "giving up" };
            println!("{} {}: {} ({})", "link failed".red(), peer_id, error, note)
        }
        SessionEvent::PeerUnreachable(peer_id) => {
            println!("{} {}", "unreachable:".red().bold(), peer_id)
        }
        SessionEvent::ConsistencyWarning(error) => {
            println!("{} {}", "warning:".yellow(), error)
        }
        SessionEvent::SpeechReceived { .. } => {}
        SessionEvent::Caption(caption) => {
            if caption.visible {
                println!(
                    "{} {}",
                    format!("[{}]", caption.speaker.display_name).cyan().bold(),
                    caption.text
                );
            }
        }
        SessionEvent::RelayError { reason } => println!("{} {}", "relay error:".red(), reason),
        SessionEvent::RelayLost => println!("{}", "relay connection lost".red().bold()),
        SessionEvent::Closed => println!("{}", "session closed".dimmed()),
    }
}
