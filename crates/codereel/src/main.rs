use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use codereel::{
    telemetry, CdnAssetSource, DisplaySink, MemoryBuffers, PlaybackOutcome, Session, SlideId,
};
use reelconf::ReelConfig;

/// Headless slide timeline editor and player
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file used in place of ./codereel.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect and edit slides
    #[command(subcommand)]
    Slides(SlidesCommand),

    /// Play the timeline, printing each frame to stdout
    Play {
        /// Delay between slides, overriding the saved setting for this run
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Delay before the first frame
        #[arg(long)]
        settle_ms: Option<u64>,
    },

    /// Show effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum SlidesCommand {
    /// List slides in playback order
    List,

    /// Append a slide, optionally filled from a file
    Add {
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Append a copy of a slide
    Duplicate { id: String },

    /// Delete a slide
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the merged configuration and where it came from
    Show,
}

/// Prints frames between separators.
struct StdoutSink;

#[async_trait]
impl DisplaySink for StdoutSink {
    async fn show(&self, code: &str) {
        println!("──────── frame ────────");
        println!("{code}");
    }

    async fn clear(&self) {
        println!("──────── end ────────");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = ReelConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    telemetry::init(&config.infra.telemetry.log_level)?;

    if let Command::Config(ConfigCommand::Show) = cli.command {
        for file in &sources.files {
            println!("# from {}", file.display());
        }
        for var in &sources.env_overrides {
            println!("# env {var}");
        }
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let session = Session::open(
        &config,
        Arc::new(MemoryBuffers::new()),
        Arc::new(CdnAssetSource::default()),
        Arc::new(StdoutSink),
    )
    .context("Failed to open project store")?;
    session.setup().await.context("Failed to restore session")?;

    match cli.command {
        Command::Slides(command) => run_slides(&session, command).await,
        Command::Play {
            interval_ms,
            settle_ms,
        } => run_play(&session, interval_ms, settle_ms).await,
        Command::Config(_) => Ok(()),
    }
}

async fn run_slides(session: &Session, command: SlidesCommand) -> Result<()> {
    let timeline = session.timeline();

    match command {
        SlidesCommand::List => {
            let snapshot = timeline.snapshot();
            for (index, slide) in snapshot.iter().enumerate() {
                let marker = if snapshot.active() == Some(&slide.id) { "*" } else { " " };
                let text = timeline.read_text(&slide.id).await.unwrap_or_default();
                let first = text.lines().next().unwrap_or("");
                println!("{marker} {index:>3}  {}  {first}", slide.id);
            }
            return Ok(());
        }
        SlidesCommand::Add { from } => {
            let id = timeline.add().await.context("Slide could not be added")?;
            if let Some(path) = from {
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                timeline.write_text(&id, &text).await?;
            }
            println!("{id}");
        }
        SlidesCommand::Duplicate { id } => {
            let copy = timeline
                .duplicate(&SlideId::from(id.as_str()))
                .await
                .with_context(|| format!("Slide {id} could not be duplicated"))?;
            println!("{copy}");
        }
        SlidesCommand::Remove { id } => {
            if !timeline.remove(&SlideId::from(id.as_str())).await {
                anyhow::bail!("Slide {id} could not be removed");
            }
        }
    }

    session.save().await.context("Failed to save project")?;
    Ok(())
}

async fn run_play(session: &Session, interval_ms: Option<u64>, settle_ms: Option<u64>) -> Result<()> {
    let mut options = session.playback_options();
    if let Some(ms) = interval_ms {
        options = options.with_interval(Duration::from_millis(ms));
    }
    if let Some(ms) = settle_ms {
        options = options.with_settle_delay(Duration::from_millis(ms));
    }

    match session.player().play(&options, None).await {
        PlaybackOutcome::Busy => anyhow::bail!("Playback already running"),
        PlaybackOutcome::Finished(report) => match report.error {
            Some(e) => Err(e).context("Playback aborted"),
            None => Ok(()),
        },
    }
}
