//! Gaze Grid - gaze-direction portrait generator
//!
//! Renders a grid of gaze images through a hosted model and resolves
//! pointer positions against the resulting index.

use gaze_grid::app::cli::{Cli, Commands, ConfigAction, GridArgs, OutputArgs};
use gaze_grid::app::config::Config;
use gaze_grid::generator::replicate::token_from_env;
use gaze_grid::generator::{GridGenerator, ReplicateClient, SourceImage};
use gaze_grid::grid::GazeIndex;
use gaze_grid::resolver::{reduce, GazeTracker, PointerSample, Transition, Viewport};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            image,
            grid,
            output,
            concurrency,
            skip_existing,
        } => {
            run_generate(&image, &grid, &output, concurrency, skip_existing, config)?;
        }
        Commands::Check { grid, output } => {
            run_check(&grid, &output, config)?;
        }
        Commands::Reindex { output, all } => {
            run_reindex(&output, all, config)?;
        }
        Commands::Resolve {
            grid,
            out_dir,
            width,
            height,
            samples,
        } => {
            run_resolve(&grid, out_dir, width, height, &samples, config)?;
        }
        Commands::Init { force } => {
            run_init(force, cli.config.as_deref(), &config)?;
        }
        Commands::Config { action } => {
            run_config(action, cli.config.as_deref(), config)?;
        }
    }

    Ok(())
}

fn with_overrides(mut config: Config, grid: &GridArgs, output: &OutputArgs) -> anyhow::Result<Config> {
    grid.apply(&mut config);
    output.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn run_generate(
    image: &str,
    grid_args: &GridArgs,
    output_args: &OutputArgs,
    concurrency: Option<usize>,
    skip_existing: bool,
    config: Config,
) -> anyhow::Result<()> {
    let mut config = with_overrides(config, grid_args, output_args)?;
    if let Some(n) = concurrency {
        config.model.concurrency = n;
        config.validate()?;
    }

    // Fail on credentials and source before touching the output directory
    let token = token_from_env(&config.model.token_env)?;
    let source = SourceImage::from_arg(image)?;
    let client = ReplicateClient::new(config.replicate_settings(token))?;

    let grid = config.grid()?;
    let mut options = config.generation_options();
    options.skip_existing = skip_existing;

    info!(
        values = grid.side(),
        total = grid.len(),
        step = grid.step(),
        "Grid: {} values per axis",
        grid.side()
    );

    let generator = GridGenerator::new(grid, options);

    let stop_flag = generator.stop_handle();
    ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(generator.run(Arc::new(client), Arc::new(source)))?;

    println!("\nGeneration finished");
    println!("  Generated: {}", report.generated);
    println!("  Skipped (existing): {}", report.skipped_existing);
    println!("  Failed: {}", report.failed.len());
    println!("  Index rows: {}", report.index_rows);
    println!("  Output: {}", report.out_dir.display());

    if report.interrupted {
        anyhow::bail!("Generation interrupted; rerun with --skip-existing to resume");
    }
    if !report.failed.is_empty() {
        for failed in &report.failed {
            println!("  - ({}, {}) {}", failed.px, failed.py, failed.reason);
        }
        anyhow::bail!("{} coordinates failed", report.failed.len());
    }
    Ok(())
}

fn run_check(grid_args: &GridArgs, output_args: &OutputArgs, config: Config) -> anyhow::Result<()> {
    let config = with_overrides(config, grid_args, output_args)?;
    let generator = GridGenerator::new(config.grid()?, config.generation_options());

    let planned = generator.planned();
    let missing = generator.missing();

    println!(
        "{} of {} files present in {}",
        planned.len() - missing.len(),
        planned.len(),
        config.output.dir.display()
    );
    if missing.is_empty() {
        return Ok(());
    }

    println!("\nMissing:");
    for asset in &missing {
        println!("  {}  (px={}, py={})", asset.filename, asset.coordinate.px, asset.coordinate.py);
    }
    anyhow::bail!("{} files missing", missing.len())
}

fn run_reindex(output_args: &OutputArgs, all: bool, config: Config) -> anyhow::Result<()> {
    let mut config = config;
    output_args.apply(&mut config);
    config.validate()?;

    let dir = &config.output.dir;
    if !dir.is_dir() {
        anyhow::bail!("Output directory not found: {}", dir.display());
    }

    let index = if all {
        GazeIndex::scan_dir(dir, None, None)?
    } else {
        GazeIndex::scan_dir(dir, Some(config.output.size), Some(config.output.format.extension()))?
    };
    if index.is_empty() {
        warn!(dir = %dir.display(), "No gaze files found");
    }

    let index_path = dir.join(&config.output.index_file);
    index.save(&index_path)?;
    println!("Wrote {} rows to {}", index.len(), index_path.display());
    Ok(())
}

fn run_resolve(
    grid_args: &GridArgs,
    out_dir: Option<std::path::PathBuf>,
    width: f64,
    height: f64,
    samples: &[PointerSample],
    config: Config,
) -> anyhow::Result<()> {
    let mut config = config;
    grid_args.apply(&mut config);
    if let Some(dir) = out_dir {
        config.output.dir = dir;
    }
    config.validate()?;

    let index_path = config.output.dir.join(&config.output.index_file);
    if !index_path.exists() {
        anyhow::bail!("Index not found: {} (run generate or reindex first)", index_path.display());
    }
    let index = GazeIndex::load(&index_path)?;
    let grid = config.grid()?;
    let viewport = Viewport::new(width, height);

    let mut tracker = GazeTracker::new(grid.clone(), &index, viewport);
    let start = tracker.current_cell();
    println!(
        "start {} -> {}",
        tracker.current_coordinate().map(|c| c.to_string()).unwrap_or_default(),
        tracker.current_filename().unwrap_or("<missing>")
    );

    for sample in samples {
        let previous = tracker.current_cell();
        let transition = reduce(&grid, &viewport, previous, *sample);
        tracker.on_pointer(*sample);

        let coord = tracker.current_coordinate().map(|c| c.to_string()).unwrap_or_default();
        let filename = tracker.current_filename().unwrap_or("<missing>");
        match transition {
            Transition::Stay(_) => println!("({}, {}) stay {}", sample.x, sample.y, coord),
            Transition::Move { .. } => println!("({}, {}) move {} -> {}", sample.x, sample.y, coord, filename),
        }
    }

    info!(swaps = tracker.swaps(), start = ?start, "Resolved {} samples", samples.len());
    Ok(())
}

fn run_init(force: bool, path: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save(&config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    std::fs::create_dir_all(&config.output.dir)?;
    println!("\nOutput directory: {:?}", config.output.dir);

    Ok(())
}

fn run_config(action: ConfigAction, path: Option<&Path>, config: Config) -> anyhow::Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => {
            let value = config.get(&key)?;
            println!("{} = {}", key, value);
        }
        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                anyhow::bail!("No config file found. Run 'gaze-gen init' first.");
            }
            let mut config = config;
            config.set(&key, &value)?;
            config.save(&config_path)?;
            println!("Set {} = {}", key, config.get(&key)?);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Config::default().save(&config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }

    Ok(())
}
