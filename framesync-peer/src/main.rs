//! FrameSync - Headless Peer
//!
//! Plays a synthetic stream and keeps it in step with whoever else is on the
//! same relay.
//!
//! Usage:
//!   framesync-peer <host> <port> [--media synthetic:name=movie:duration=600:fps=25]
//!                  [--config sync.json] [--plain] [--offline]

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use framesync_core::render::HeadlessRenderer;
use framesync_core::{Player, SyncConfig, SyntheticDecoder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_MEDIA: &str = "synthetic:";

struct Args {
    host: String,
    port: u16,
    media: String,
    config: Option<PathBuf>,
    plain: bool,
    offline: bool,
}

fn usage() -> String {
    "usage: framesync-peer <host> <port> [--media PATH] [--config FILE] [--plain] [--offline]".to_string()
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut media = DEFAULT_MEDIA.to_string();
    let mut config = None;
    let mut plain = false;
    let mut offline = false;

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--media" => media = iter.next().ok_or_else(usage)?.clone(),
            "--config" => config = Some(PathBuf::from(iter.next().ok_or_else(usage)?)),
            "--plain" => plain = true,
            "--offline" => offline = true,
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}\n{}", flag, usage())),
            value => positional.push(value.to_string()),
        }
    }

    let (host, port) = match positional.as_slice() {
        [host, port] => (
            host.clone(),
            port.parse::<u16>().map_err(|_| format!("invalid port '{}'\n{}", port, usage()))?,
        ),
        [] if offline => ("127.0.0.1".to_string(), 0),
        _ => return Err(usage()),
    };

    Ok(Args {
        host,
        port,
        media,
        config,
        plain,
        offline,
    })
}

fn init_tracing(plain: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("framesync_core=debug,framesync_peer=info"));
    tracing_subscriber::fmt()
        .with_ansi(!plain)
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    init_tracing(args.plain);

    let config = SyncConfig::load(args.config.as_deref())?;
    let decoder = SyntheticDecoder::open(&args.media)?;
    let renderer = HeadlessRenderer::new();
    let quit = renderer.quit_handle();

    let mut player = Player::new(decoder, renderer, config)?;

    player.runtime_handle().spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            quit.store(true, Ordering::SeqCst);
        }
    });

    if args.offline {
        info!("Running offline");
    } else if let Err(e) = player.connect(&args.host, args.port) {
        // Local playback does not depend on the status channel
        warn!("{}; playing locally", e);
    }

    player.run();
    player.shutdown();
    Ok(())
}
