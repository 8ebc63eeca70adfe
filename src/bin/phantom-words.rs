//! Phantom Words application
//!
//! `phantom-words` serves the web dashboard.
//! `phantom-words play <file> [file2] [--delay ms] [--loops n] [--speed x] [--speed2 x]`
//! plays straight from the command line.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phantom_words::{
    audio::{
        context::{ContextFactory, OfflineContextFactory},
        device::list_output_devices,
        output::CpalContextFactory,
    },
    config::{AppConfig, AudioBackend},
    constants::DEFAULT_SAMPLE_RATE,
    codec::AudioDecoder,
    playback::{PlaybackForm, PlaybackManager},
    ui::WebServer,
};

/// Options of the `play` subcommand
struct PlayArgs {
    files: Vec<String>,
    delay: String,
    loops: String,
    speed1: String,
    speed2: String,
}

fn parse_play_args(args: &[String]) -> Result<PlayArgs> {
    let mut parsed = PlayArgs {
        files: Vec::new(),
        delay: "200".to_string(),
        loops: "10".to_string(),
        speed1: "1.0".to_string(),
        speed2: "1.0".to_string(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let slot = match arg.as_str() {
            "--delay" => &mut parsed.delay,
            "--loops" => &mut parsed.loops,
            "--speed" => &mut parsed.speed1,
            "--speed2" => &mut parsed.speed2,
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            file => {
                parsed.files.push(file.to_string());
                continue;
            }
        };
        *slot = iter.next().with_context(|| format!("{} needs a value", arg))?.clone();
    }

    match parsed.files.len() {
        1 | 2 => Ok(parsed),
        _ => bail!(
            "usage: phantom-words play <file> [file2] \
             [--delay ms] [--loops n] [--speed x] [--speed2 x]"
        ),
    }
}

fn track_json(path: &str) -> String {
    let filename = std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    serde_json::json!({ "content": path, "filename": filename }).to_string()
}

async fn play(manager: PlaybackManager, args: PlayArgs) -> Result<()> {
    let dual = args.files.len() == 2;
    let form = PlaybackForm {
        click: Some(1),
        delay: Some(args.delay),
        loops: Some(args.loops),
        track1: Some(track_json(&args.files[0])),
        track2: args.files.get(1).map(|f| track_json(f)),
        mode: Some(if dual { "dual" } else { "single" }.to_string()),
        speed1: Some(args.speed1),
        speed2: Some(args.speed2),
    };

    let status = manager.request_playback(&form);
    println!("{}", status.render(manager.locale()));
    if status.is_error() {
        bail!("playback request rejected");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", manager.stop_playback().render(manager.locale()));
                return Ok(());
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if !manager.is_playing() {
                    return Ok(());
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Phantom Words");

    let config_path = AppConfig::config_path();
    let config = AppConfig::load_or_default(config_path.as_deref())?;

    let factory: Arc<dyn ContextFactory> = match config.audio.backend {
        AudioBackend::Cpal => {
            println!("\n=== Available Output Devices ===");
            for device in list_output_devices() {
                let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                println!("  {}{}:", device.name, default_marker);
                println!("    Sample rates: {:?}", device.sample_rates);
                println!("    Channels: {:?}", device.channels);
            }
            println!();
            Arc::new(CpalContextFactory::new(config.audio.output_device.clone()))
        }
        AudioBackend::Offline => {
            tracing::warn!("Offline backend selected, audio is rendered nowhere");
            Arc::new(OfflineContextFactory::new(DEFAULT_SAMPLE_RATE))
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let play_args = match args.first().map(String::as_str) {
        Some("play") => Some(parse_play_args(&args[1..])?),
        _ => None,
    };

    // Local files are readable from the command line only, never over HTTP
    let decoder = AudioDecoder::new(config.audio.max_payload_bytes)
        .with_file_locators(play_args.is_some());
    let manager = PlaybackManager::from_config(factory, decoder, &config.audio, config.locale);

    if let Some(play_args) = play_args {
        return play(manager, play_args).await;
    }

    let web_server = WebServer::new(config.ui.clone(), manager.clone());
    let web_handle = web_server.start_background();

    tracing::info!(
        "Web UI available at http://{}:{}",
        config.ui.bind_address,
        config.ui.http_port
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
        result = web_handle => {
            result??;
        }
    }

    manager.stop_playback();
    Ok(())
}
