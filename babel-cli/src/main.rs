mod console;
mod synthetic;

use anyhow::{Context, Result};
use babel_core::utils::{DEFAULT_ROOM, DEFAULT_STUN_ADDR};
use babel_core::{Identity, IceServerConfig};
use babel_relay::RelayConfig;
use babel_session::{
    PassthroughTranslator, Session, SessionConfig, SessionEvent, WebRtcConnector,
    WsSignalingTransport,
};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "babel")]
#[command(about = "Multilingual mesh video rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: SocketAddr,
    },

    /// Join a room headless. Lines typed on stdin are published as speech.
    Join {
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        url: String,

        #[arg(long)]
        room: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "en-US")]
        lang: String,

        #[arg(long)]
        listen_lang: Option<String>,

        #[arg(long = "ice-server")]
        ice_servers: Vec<String>,

        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Relay { addr } => {
            println!("{}", format!("Relay listening on ws://{addr}/ws").green().bold());
            babel_relay::serve(RelayConfig { addr }).await?;
        }

        Commands::Join {
            url,
            room,
            name,
            lang,
            listen_lang,
            ice_servers,
            timeout_secs,
        } => {
            let room = match room {
                Some(room) => room,
                None => Input::new()
                    .with_prompt("Room")
                    .default(DEFAULT_ROOM.to_owned())
                    .interact_text()?,
            };
            let name = match name {
                Some(name) => name,
                None => Input::new().with_prompt("Display name").interact_text()?,
            };
            let listen_lang = listen_lang.unwrap_or_else(|| lang.clone());

            let ice_servers = if ice_servers.is_empty() {
                vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)]
            } else {
                ice_servers.into_iter().map(IceServerConfig::stun).collect()
            };
            let config = SessionConfig::default()
                .with_ice_servers(ice_servers)
                .with_negotiation_timeout(Duration::from_secs(timeout_secs));

            join(url, room, Identity::new(name, lang), listen_lang, config).await?;
        }
    }

    Ok(())
}

async fn join(
    url: String,
    room: String,
    identity: Identity,
    listen_lang: String,
    config: SessionConfig,
) -> Result<()> {
    println!("{}", format!("Connecting to {url}...").cyan());

    let connector = WebRtcConnector::new(config.ice_servers.clone());
    let session = Session::new(
        Arc::new(WsSignalingTransport::new(url)),
        Arc::new(connector),
        Arc::new(console::ConsoleRenderer),
        config,
    )
    .with_captions(
        Arc::new(PassthroughTranslator),
        Arc::new(console::ConsoleSpeaker),
        listen_lang,
    );
    let mut events = session.subscribe();

    let (media, silence) = synthetic::silent_microphone();
    let handle = session
        .join(room.as_str(), identity, media)
        .await
        .context("Failed to join room")?;
    println!(
        "{}",
        format!("Joined '{}' as {}. Type to speak, Ctrl-C to leave.", room, handle.local_id())
            .green()
            .bold()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Closed) => break,
                Ok(event) => console::print_event(&event),
                Err(RecvError::Lagged(n)) => println!("{}", format!("({n} events skipped)").dimmed()),
                Err(RecvError::Closed) => break,
            },

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    handle.publish_transcript(text.trim()).await?;
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => stdin_open = false,
            },

            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Leaving...".yellow());
                handle.leave().await;
                break;
            }
        }
    }

    silence.abort();
    println!("{}", "Bye.".green());
    Ok(())
}
