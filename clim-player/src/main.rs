//! Terminal player for CLIM video files.
//!
//! Decodes a CLIM file with `clim-core` and renders it as 24-bit ANSI
//! color cells, handing the embedded audio track to an external `ffplay`
//! process.

mod audio;
mod player;
mod render;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::player::ClimPlayer;

/// Play a CLIM video file in the terminal.
#[derive(Parser)]
#[command(name = "clim-player")]
#[command(about = "Terminal player for CLIM video files")]
#[command(version)]
struct Cli {
    /// Path to the .clim file to play
    input: PathBuf,

    /// Restart playback from the first frame whenever the file ends
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Folder the audio track is extracted into
    #[arg(long, default_value = ".audio_extraction")]
    audio_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut player = ClimPlayer::new(&cli.input, &cli.audio_dir)?;
    let stdout = io::stdout();
    player.play(&mut stdout.lock(), cli.loop_playback)
}
