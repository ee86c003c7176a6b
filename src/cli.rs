use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "moodprobe", about = "Mood scores and genre candidates for music files")]
pub struct Cli {
    /// Input audio files (WAV, MP3, OGG, FLAC, WMA, AAC)
    pub inputs: Vec<PathBuf>,

    /// Config file (defaults to moodprobe.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the model artifacts
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Model version suffix, e.g. v1
    #[arg(long)]
    pub model_version: Option<String>,

    /// Write a waveform preview JSON per input into this directory
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,

    /// Pretty-print result records
    #[arg(long)]
    pub pretty: bool,

    /// List the genre labels and exit
    #[arg(long)]
    pub list_genres: bool,
}
