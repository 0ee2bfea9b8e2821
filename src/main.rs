use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use manifestmerger::merge::{Feature, ManifestMerger, MergeType, SystemProperty};
use manifestmerger::report::{MergingReport, ReportFormat, Reporter};
use manifestmerger::Config;

/// manifestmerger - Merge Android manifests from an app, its overlays and its libraries
#[derive(Parser, Debug)]
#[command(name = "manifestmerger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Main manifest of the module being built
    main: PathBuf,

    /// Library manifest (repeatable, highest priority first)
    #[arg(long = "lib", value_name = "FILE")]
    libraries: Vec<PathBuf>,

    /// Overlay manifest (repeatable, highest priority first)
    #[arg(long = "overlay", value_name = "FILE")]
    overlays: Vec<PathBuf>,

    /// Write the merged manifest to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// What the merged manifest is for
    #[arg(long, value_enum)]
    merge_type: Option<MergeTypeArg>,

    /// Placeholder value, e.g. --placeholder appName=Demo
    #[arg(long = "placeholder", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    placeholders: Vec<(String, String)>,

    /// System property override, e.g. --property versionCode=42
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(SystemProperty, String)>,

    /// Enable an optional behaviour, e.g. --feature keep-intermediary-stages
    #[arg(long = "feature", value_name = "NAME")]
    features: Vec<Feature>,

    /// Output format for the merging report
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Write the persisted action log to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Write the blame log of the merged manifest to this file
    #[arg(long, value_name = "FILE")]
    blame: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum MergeTypeArg {
    Application,
    Library,
}

impl From<MergeTypeArg> for MergeType {
    fn from(merge_type: MergeTypeArg) -> Self {
        match merge_type {
            MergeTypeArg::Application => MergeType::Application,
            MergeTypeArg::Library => MergeType::Library,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_property(raw: &str) -> std::result::Result<(SystemProperty, String), String> {
    let (key, value) = parse_key_value(raw)?;
    Ok((key.parse()?, value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    info!("manifestmerger v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&cli)?;

    let report = run_merge(&config, &cli)?;
    if !report.result().is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // stdout carries the merged manifest and the report
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from default locations next to the main manifest
        let project_root = cli
            .main
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Config::from_default_locations(project_root)?
    };

    // Override with CLI arguments
    if let Some(merge_type) = &cli.merge_type {
        config.merge.merge_type = merge_type.clone().into();
    }
    config.merge.libraries.extend(cli.libraries.iter().cloned());
    config.merge.overlays.extend(cli.overlays.iter().cloned());
    config.merge.features.extend(cli.features.iter().copied());
    config.placeholders.extend(cli.placeholders.iter().cloned());
    for (property, value) in &cli.properties {
        let slot = match property {
            SystemProperty::Package => &mut config.overrides.package,
            SystemProperty::VersionCode => &mut config.overrides.version_code,
            SystemProperty::VersionName => &mut config.overrides.version_name,
            SystemProperty::MinSdkVersion => &mut config.overrides.min_sdk_version,
            SystemProperty::TargetSdkVersion => &mut config.overrides.target_sdk_version,
            SystemProperty::MaxSdkVersion => &mut config.overrides.max_sdk_version,
        };
        *slot = Some(value.clone());
    }
    if let Some(format) = &cli.format {
        config.report.format = format.clone().into();
    }
    if cli.blame.is_some() {
        config.report.blame = true;
    }

    Ok(config)
}

fn run_merge(config: &Config, cli: &Cli) -> Result<MergingReport> {
    let merger = config.apply(ManifestMerger::new(cli.main.clone(), config.merge.merge_type));
    let report = merger.merge();
    debug!("Merge finished with {} records", report.records().len());

    Reporter::new(config.report.format.clone(), cli.report.clone()).report(&report)?;

    if let Some(xml) = report.merged_xml() {
        match &cli.out {
            Some(path) => {
                write_output(path, &xml)?;
                if !cli.quiet {
                    println!("{} {}", "Merged manifest written to:".green(), path.display());
                }
            }
            None => println!("{}", xml),
        }
    }

    if let Some(path) = &cli.log_file {
        write_output(path, &report.actions().persist())?;
    }

    if config.report.blame {
        if let Some(document) = report.merged_document() {
            let blame = report
                .actions()
                .blame(document)
                .into_diagnostic()
                .wrap_err("Failed to build the blame log")?;
            match &cli.blame {
                Some(path) => write_output(path, &blame)?,
                None => print!("{}", blame),
            }
        }
    }

    Ok(report)
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write {}", path.display()))
}
