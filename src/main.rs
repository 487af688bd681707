use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facemark::player::run_headless;
use facemark::{config, display, launch, models, SourceSpec};
use log::{error, info};

#[derive(Parser)]
#[command(name = "facemark")]
#[command(
    version,
    about = "Real-time facial landmark overlay on video frames"
)]
struct Cli {
    /// Config file (defaults to $FACEMARK_CONFIG, then the built-in path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate frames from the configured source in a window (default)
    Run {
        /// Camera device, video file or image (overrides the config)
        #[arg(short, long)]
        source: Option<String>,
        /// Skip the window
        #[arg(long)]
        headless: bool,
        /// Write annotated frames as PNG into this directory (headless only)
        #[arg(short, long, requires = "headless")]
        output: Option<PathBuf>,
        /// Stop after this many frames (headless only)
        #[arg(long, requires = "headless")]
        max_frames: Option<u64>,
    },
    /// Annotate a single image file
    Annotate {
        input: PathBuf,
        output: PathBuf,
    },
    /// Open config file in editor
    Config {
        /// Print the effective config instead
        #[arg(long)]
        print: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        None => run(&cfg, false, None, None),
        Some(Commands::Run {
            source,
            headless,
            output,
            max_frames,
        }) => {
            if let Some(source) = source {
                cfg.source = source;
            }
            run(&cfg, headless, output.as_deref(), max_frames)
        }
        Some(Commands::Annotate { input, output }) => annotate(&cfg, &input, &output),
        Some(Commands::Config { print }) => {
            if print {
                print!("{}", toml::to_string_pretty(&cfg)?);
                Ok(())
            } else {
                open_config(cli.config.as_deref())
            }
        }
    }
}

fn run(
    cfg: &config::Config,
    headless: bool,
    output: Option<&Path>,
    max_frames: Option<u64>,
) -> Result<()> {
    let cwd = env::current_dir().context("resolving working directory")?;
    let mut player = launch(cfg, &cwd, |spec| spec.open()).inspect_err(acknowledge)?;

    if headless {
        let frames = run_headless(&mut player, output, max_frames)?;
        info!("annotated {} frame(s)", frames);
        return Ok(());
    }

    let hold = matches!(SourceSpec::parse(&cfg.source), SourceSpec::StillImage(_));
    let poll = Duration::from_millis(cfg.pipeline.poll_interval_ms);
    display::show(player, poll, hold)
}

fn annotate(cfg: &config::Config, input: &Path, output: &Path) -> Result<()> {
    let cwd = env::current_dir().context("resolving working directory")?;
    let mut annotator = models::load_models(cfg, &cwd)
        .map_err(anyhow::Error::from)
        .inspect_err(acknowledge)?;

    let mut frame = image::open(input)
        .with_context(|| format!("opening {}", input.display()))?
        .to_rgb8();
    let report = annotator.annotate(&mut frame);
    frame
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "{}: {} face(s), {} marker(s) -> {}",
        input.display(),
        report.faces.len(),
        report.markers,
        output.display()
    );
    Ok(())
}

/// Startup failures stay on screen until the operator presses Enter.
fn acknowledge(e: &anyhow::Error) {
    error!("{:#}", e);
    if std::io::stdin().is_terminal() {
        eprintln!("Press Enter to exit.");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }
}

fn open_config(explicit: Option<&Path>) -> Result<()> {
    let config_path = config::config_path(explicit);
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(&config_path))?;
        info!("Wrote default config to {}", config_path.display());
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {}", config_path.display());

    let status = std::process::Command::new(editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
