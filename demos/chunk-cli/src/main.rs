mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chunk-cli",
    version,
    about = "Split audio into fixed-duration WAV chunks",
    long_about = "Replay an audio file or record a microphone into independently encoded WAV chunks, \
                  spooled to a directory with JSON metadata sidecars."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Cut a prerecorded file into chunks (replay capture)
    Split(SplitArgs),

    /// Record the microphone into chunks (live capture)
    Record(RecordArgs),

    /// List available audio input devices
    Devices,

    /// Print the header of a chunk file
    Inspect {
        /// WAV file to read
        file: PathBuf,
    },
}

/// Options shared by every command that produces chunks.
#[derive(Debug, Args)]
pub struct ChunkOptions {
    /// Chunk duration in seconds (overrides --config)
    #[arg(long)]
    pub chunk_secs: Option<f64>,

    /// JSON chunking configuration, e.g. {"chunk_duration_secs": 60}
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output directory (default: Documents/Meeting Chunks)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Encrypt chunks with this AES-256 key (64 hex characters)
    #[arg(long)]
    pub key_hex: Option<String>,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Audio file to split (wav, mp3, ogg, flac, m4a, webm)
    pub file: PathBuf,

    /// Container MIME type or extension, when the file name does not tell
    #[arg(long)]
    pub format: Option<String>,

    #[command(flatten)]
    pub chunks: ChunkOptions,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// How long to record, in seconds
    #[arg(long, default_value_t = 30.0)]
    pub seconds: f64,

    /// Input device name (default: system default input)
    #[arg(long)]
    pub device: Option<String>,

    /// Pause for this many seconds halfway through
    #[arg(long)]
    pub pause_secs: Option<f64>,

    #[command(flatten)]
    pub chunks: ChunkOptions,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Split(args) => commands::split(&args),
        Commands::Record(args) => commands::record(&args),
        Commands::Devices => commands::devices(),
        Commands::Inspect { file } => commands::inspect(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
