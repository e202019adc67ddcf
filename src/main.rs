use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shotdiff::{BatchRunner, Config, YiqComparator, sweep_stale_overlays};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "shotdiff")]
#[command(version, long_about = None)]
#[command(about = "Pair before/after screenshots and highlight changed pixels")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Override the configured image directory
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare every A/B pair and write overlay images (default)
    Compare {
        /// Keep overlays from previous runs instead of sweeping them first
        #[arg(long)]
        no_clean: bool,

        /// Print the summary as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file without falling back to defaults
    CheckConfig,

    /// Delete overlay images left by previous runs
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let command = cli.command.unwrap_or(Commands::Compare { no_clean: false, json: false });
    match command {
        Commands::Compare { no_clean, json } => {
            let mut config = Config::load_or_default(&cli.config);
            apply_dir_override(&mut config, cli.dir);
            if no_clean {
                config.output.clean_before_run = false;
            }
            run_compare(&config, json)
        }
        Commands::CheckConfig => check_config(&cli.config, cli.dir),
        Commands::Clean => {
            let mut config = Config::load_or_default(&cli.config);
            apply_dir_override(&mut config, cli.dir);
            let removed = sweep_stale_overlays(&config.image_directory, &config)?;
            println!("Removed {removed} stale overlay image(s)");
            Ok(())
        }
    }
}

fn apply_dir_override(config: &mut Config, dir: Option<PathBuf>) {
    if let Some(dir) = dir {
        config.image_directory = dir;
    }
}

fn run_compare(config: &Config, json: bool) -> Result<()> {
    let runner = BatchRunner::new(config, YiqComparator);
    if json {
        let summary = runner.run()?;
        let rendered =
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Image directory: {}", config.image_directory.display());
    println!("Overlay prefix: {}", config.output.diff_prefix);
    let summary = runner.run()?;

    if summary.total_pairs == 0 {
        let ext = config.file_patterns.extension();
        let sep = &config.file_patterns.separator;
        let (a, b) = (&config.file_patterns.marker_a, &config.file_patterns.marker_b);
        println!("No comparable image pairs found. Supported names:");
        println!("  <prefix>{sep}{a}{sep}<number>{ext} vs <prefix>{sep}{b}{sep}<number>{ext}");
        println!("  <prefix>{sep}{a}<number>{ext} vs <prefix>{sep}{b}<number>{ext}");
        println!("  <prefix>{sep}{a}{sep}<suffix>{ext} vs <prefix>{sep}{b}{sep}<suffix>{ext}");
        println!("Enabled rules: {:?}", config.file_patterns.rules);
    }

    println!();
    print!("{summary}");
    Ok(())
}

fn check_config(path: &Path, dir: Option<PathBuf>) -> Result<()> {
    let mut config = Config::from_file(path)
        .with_context(|| format!("Configuration check failed for {}", path.display()))?;
    apply_dir_override(&mut config, dir);

    println!("Config file: {}", path.display());
    println!("  image directory: {}", config.image_directory.display());
    if !config.image_directory.is_dir() {
        log::warn!("Image directory {} does not exist", config.image_directory.display());
    }
    println!("  file extension: {}", config.file_patterns.extension());
    println!(
        "  role markers: {} / {} (separator {:?})",
        config.file_patterns.marker_a,
        config.file_patterns.marker_b,
        config.file_patterns.separator
    );
    println!("  filename rules: {:?}", config.file_patterns.rules);
    println!("  threshold: {}", config.comparison.threshold);
    println!("  include anti-aliasing: {}", config.comparison.include_anti_aliasing);
    println!("  overlay prefix: {}", config.output.diff_prefix);
    println!("  generate overlays: {}", config.output.generate_diff_images);
    println!("Configuration OK");
    Ok(())
}
