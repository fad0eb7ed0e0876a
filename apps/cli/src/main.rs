use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use chrono::{TimeDelta, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tubeforge_core::{
    AssetId, BatchItem, BatchScheduler, JsonFileStore, Orchestrator, Settings,
    config::{default_config_path, resolve_config_path},
    format_asset_line, format_asset_readable, format_batch_outcome,
};

/// CLI wrapper for tone labels (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliTone {
    #[default]
    Engaging,
    Educational,
    Funny,
}

impl CliTone {
    fn label(self) -> &'static str {
        match self {
            CliTone::Engaging => "engaging",
            CliTone::Educational => "educational",
            CliTone::Funny => "funny",
        }
    }
}

#[derive(Parser)]
#[command(name = "tubeforge")]
#[command(about = "Turn video topics into scripts and voice-overs, and schedule them for upload")]
struct Cli {
    /// Settings file (defaults to $TUBEFORGE_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the output directory from the settings file
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce one video asset
    Single {
        /// Video topic
        topic: String,

        /// Who the video is for
        #[arg(short, long, default_value = "general")]
        audience: String,

        #[arg(short, long, value_enum, default_value_t = CliTone::Engaging)]
        tone: CliTone,

        /// Schedule (and upload, if configured) this many hours from now
        #[arg(short, long)]
        schedule_in: Option<u32>,
    },

    /// Produce and schedule every item of a JSON file: [{"topic": ..., "audience": ..., "tone": ...}]
    Batch {
        file: PathBuf,

        /// Hours between scheduled slots (defaults to the settings file)
        #[arg(long)]
        hours_apart: Option<u32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a stored asset record
    Show {
        id: String,

        /// Print the raw record
        #[arg(long)]
        json: bool,
    },

    /// List stored asset records
    List,

    /// Write a settings file with every default filled in
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = dir.clone();
    }
    Ok(settings)
}

fn print_header() {
    println!(
        "\n{}  {}\n",
        style("tubeforge").cyan().bold(),
        style("Video Asset Pipeline").dim()
    );
}

async fn run_single(
    settings: &Settings,
    topic: &str,
    audience: &str,
    tone: CliTone,
    schedule_in: Option<u32>,
) -> Result<()> {
    let slot = match schedule_in {
        Some(hours) => Some(
            TimeDelta::try_hours(i64::from(hours))
                .and_then(|delay| Utc::now().checked_add_signed(delay))
                .with_context(|| format!("cannot schedule {hours} hours from now"))?,
        ),
        None => None,
    };
    let orchestrator = Orchestrator::from_settings(settings)?;
    print_header();

    let spinner = create_spinner(&format!("Producing \"{}\"...", topic));
    let mut asset = match orchestrator.run_pipeline(topic, audience, tone.label()).await {
        Ok(asset) => asset,
        Err(e) => {
            spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), e));
            return Err(e.into());
        }
    };
    spinner.finish_with_message(format!(
        "{} Produced: {}",
        style("✓").green().bold(),
        style(&asset.id).dim()
    ));

    if let Some(slot) = slot {
        let spinner = create_spinner("Publishing...");
        orchestrator.publish(&mut asset, slot).await?;
        spinner.finish_with_message(format!(
            "{} {} for {}",
            style("✓").green().bold(),
            asset.status,
            style(slot.format("%Y-%m-%d %H:%M UTC")).yellow()
        ));
    }

    let record = settings.layout().record_path(&asset.id);
    println!(
        "\n{} {}\n",
        style("Saved:").dim(),
        style(record.display()).cyan()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_asset_readable(&asset));
    Ok(())
}

async fn run_batch(
    settings: &Settings,
    file: &Path,
    hours_apart: Option<u32>,
    json: bool,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let items: Vec<BatchItem> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a list of batch items", file.display()))?;
    if items.is_empty() {
        bail!("{} contains no items", file.display());
    }

    let hours_apart = hours_apart.unwrap_or(settings.batch.hours_apart);
    let scheduler = BatchScheduler::new(
        Orchestrator::from_settings(settings)?,
        settings.batch.item_delay(),
    );

    if !json {
        print_header();
    }
    let spinner = create_spinner(&format!(
        "Producing {} videos, {} hours apart...",
        items.len(),
        hours_apart
    ));
    let outcomes = scheduler.run_batch(&items, hours_apart).await;
    let succeeded = outcomes.iter().filter(|o| o.is_scheduled()).count();
    spinner.finish_with_message(format!(
        "{} {}/{} scheduled",
        if succeeded == outcomes.len() {
            style("✓").green().bold()
        } else {
            style("!").yellow().bold()
        },
        succeeded,
        outcomes.len()
    ));

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        println!();
        for (index, outcome) in outcomes.iter().enumerate() {
            println!("{}", format_batch_outcome(index, outcome));
        }
    }
    Ok(())
}

async fn run_show(settings: &Settings, id: &str, json: bool) -> Result<()> {
    let store = JsonFileStore::new(settings.layout());
    let asset = store.load(&AssetId::from(id)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&asset)?);
    } else {
        println!("{}", format_asset_readable(&asset));
    }
    Ok(())
}

async fn run_list(settings: &Settings) -> Result<()> {
    let store = JsonFileStore::new(settings.layout());
    let assets = store.list().await?;
    if assets.is_empty() {
        println!(
            "{}",
            style(format!("No assets in {}", settings.output_dir.display())).dim()
        );
    }
    for asset in &assets {
        println!("{}", format_asset_line(asset));
    }
    Ok(())
}

async fn run_init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = resolve_config_path(cli.config.as_deref())
        .or_else(default_config_path)
        .context("no config directory available, pass --config")?;
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut settings = Settings::default();
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = dir.clone();
    }
    tokio::fs::write(&path, settings.to_toml()?).await?;
    println!(
        "{} Wrote {}",
        style("✓").green().bold(),
        style(path.display()).cyan()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::InitConfig { force } = &cli.command {
        return run_init_config(&cli, *force).await;
    }

    let settings = load_settings(&cli)?;
    match &cli.command {
        Command::Single {
            topic,
            audience,
            tone,
            schedule_in,
        } => run_single(&settings, topic, audience, *tone, *schedule_in).await,
        Command::Batch {
            file,
            hours_apart,
            json,
        } => run_batch(&settings, file, *hours_apart, *json).await,
        Command::Show { id, json } => run_show(&settings, id, *json).await,
        Command::List => run_list(&settings).await,
        Command::InitConfig { .. } => Ok(()),
    }
}
