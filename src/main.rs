mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use cli::Cli;
use moodprobe::audio::preview::WaveformPreview;
use moodprobe::config::{self, Config};
use moodprobe::model::ModelSet;
use moodprobe::scoring::genre::GENRES;
use moodprobe::{AnalysisError, Analyzer, Session};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_genres {
        println!("Genre labels:");
        for (code, label) in GENRES.iter().enumerate() {
            println!("  {:>2}  {}", code, label);
        }
        return Ok(());
    }

    let mut config = match config::discover_config_path(cli.config.as_deref()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };
    if let Some(dir) = cli.models_dir.clone() {
        config.models.dir = dir;
    }
    if let Some(version) = cli.model_version.clone() {
        config.models.version = version;
    }
    config.validate().context("Invalid configuration")?;

    if cli.inputs.is_empty() {
        anyhow::bail!("At least one input audio file is required");
    }

    log::info!("Loading models ({}) from {}", config.models.version, config.models.dir.display());
    let models = ModelSet::load(&config.models)?;
    if let Err(err) = models.check_dims(&config) {
        err.log("Model set does not fit the configured features");
        return Err(err.into());
    }
    let analyzer = Analyzer::new(&config, &models)?;

    if let Some(dir) = &cli.preview_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create preview dir: {}", dir.display()))?;
    }

    let pb = if cli.inputs.len() > 1 {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut failures = 0;
    for input in &cli.inputs {
        match analyze_one(input, &config, &analyzer, &cli) {
            Ok(()) => {}
            Err(err) => {
                failures += 1;
                err.log(&format!("Analysis of {} failed", input.display()));
                eprintln!("{}: {}", input.display(), err.public_message());
            }
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_with_message("Analysis complete");
    }

    if failures > 0 {
        anyhow::bail!("{} of {} input(s) failed", failures, cli.inputs.len());
    }
    Ok(())
}

/// Upload and analyse one file in its own session.
fn analyze_one(input: &Path, config: &Config, analyzer: &Analyzer<'_>, cli: &Cli) -> Result<(), AnalysisError> {
    let mut session = Session::new();
    session.upload_file(input, config)?;
    let record = session.analyze(analyzer)?;

    println!("{}", record.to_json(cli.pretty)?);

    if let (Some(dir), Some(preview)) = (&cli.preview_dir, session.preview()) {
        if let Err(e) = write_preview(dir, input, preview) {
            log::warn!("{:#}", e);
        }
    }
    Ok(())
}

fn write_preview(dir: &Path, input: &Path, preview: &WaveformPreview) -> Result<()> {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("waveform");
    let path = dir.join(format!("{}.preview.json", stem));
    let json = serde_json::to_vec(preview).context("Failed to serialise preview")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write preview: {}", path.display()))?;
    log::info!("Preview written to {}", path.display());
    Ok(())
}
