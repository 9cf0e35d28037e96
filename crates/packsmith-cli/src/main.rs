use clap::{Parser, Subcommand};
use merge_engine::DocumentMergeService;
use packsmith_core::config::{load_merge_config, Settings};
use packsmith_core::logging::init_logging;
use packsmith_core::{Mergeable, PathResolver};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "packsmith",
    about = "Resolve classpath resources and merge XML configuration for artifact assembly"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Classpath entries, `:`-separated or repeated; replaces the configured classpath
    #[arg(long, global = true, value_delimiter = ':')]
    classpath: Vec<PathBuf>,

    /// Also write logs to packsmith.log in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge XML documents, first to last, into one file
    Merge {
        /// Input documents, in merge order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Merge rules file; defaults to the `merge` section of the settings
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Print every location backing a logical path
    Resolve {
        /// Logical path, e.g. com/acme/install.xml
        path: String,
    },
    /// Copy the resources for a path or package into a directory
    Collect {
        /// Logical path, or dotted package name with --package
        path: String,
        /// Target directory
        #[arg(long)]
        into: PathBuf,
        /// Remap every resource under this destination
        #[arg(long)]
        destination: Option<String>,
        /// Treat the argument as a dotted package name
        #[arg(long)]
        package: bool,
    },
    /// Copy the resources an extension-point class needs into a directory
    Extension {
        /// Simple or fully qualified class name
        class: String,
        /// Target directory
        #[arg(long)]
        into: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let _guard = init_logging(&settings.logging)?;
    tracing::debug!(classpath = ?settings.classpath.entries, "loaded settings");

    match &cli.command {
        Commands::Merge {
            inputs,
            output,
            rules,
        } => cmd_merge(&settings, inputs, output, rules.as_deref()),
        Commands::Resolve { path } => cmd_resolve(&settings, path),
        Commands::Collect {
            path,
            into,
            destination,
            package,
        } => cmd_collect(&settings, path, into, destination.as_deref(), *package),
        Commands::Extension { class, into } => cmd_extension(&settings, class, into),
    }
}

/// Settings from `--config` (or defaults), with command-line overrides applied.
fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if !cli.classpath.is_empty() {
        settings.classpath.entries = cli.classpath.clone();
    }
    if let Some(dir) = &cli.log_dir {
        settings.logging.dir = Some(dir.clone());
    }
    Ok(settings)
}

fn cmd_merge(
    settings: &Settings,
    inputs: &[PathBuf],
    output: &Path,
    rules: Option<&Path>,
) -> anyhow::Result<()> {
    let config = match rules {
        Some(path) => load_merge_config(path)?,
        None => settings.merge.clone(),
    };
    let service = DocumentMergeService::from_config(&config);
    service.merge_files(inputs, output)?;
    println!("Merged {} documents into {}", inputs.len(), output.display());
    Ok(())
}

fn cmd_resolve(settings: &Settings, path: &str) -> anyhow::Result<()> {
    let resolver = PathResolver::from_settings(settings);
    for location in resolver.resolve_path(path)? {
        println!("{}", location);
    }
    Ok(())
}

fn cmd_collect(
    settings: &Settings,
    path: &str,
    into: &Path,
    destination: Option<&str>,
    package: bool,
) -> anyhow::Result<()> {
    let resolver = PathResolver::from_settings(settings);
    let mergeables = match (package, destination) {
        (true, None) => resolver.mergeables_for_package(path)?,
        (true, Some(destination)) => {
            let prefix = packsmith_core::classpath::package_prefix(path);
            resolver.mergeables_for_path_with_destination(&prefix, destination)?
        }
        (false, None) => resolver.mergeables_for_path(path)?,
        (false, Some(destination)) => {
            resolver.mergeables_for_path_with_destination(path, destination)?
        }
    };
    if mergeables.is_empty() {
        eprintln!("Nothing found for {}", path);
        return Ok(());
    }
    deposit_all(&mergeables, into)
}

fn cmd_extension(settings: &Settings, class: &str, into: &Path) -> anyhow::Result<()> {
    let resolver = PathResolver::from_settings(settings);
    let merge = resolver.mergeables_for_extension_point(class)?;
    println!("{} ({})", merge.class.name(), merge.class.location());
    deposit_all(&merge.mergeables, into)
}

fn deposit_all(mergeables: &[Mergeable], into: &Path) -> anyhow::Result<()> {
    let mut files = 0;
    for mergeable in mergeables {
        let written = mergeable.deposit(into)?;
        println!("  {} -> {} files", mergeable.location(), written.len());
        files += written.len();
    }
    println!("Deposited {} files into {}", files, into.display());
    Ok(())
}
