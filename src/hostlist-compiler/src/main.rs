//! Command-line interface for the hostlist compiler.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use hostlist_compiler::{
    diff, read_config, CompilerOptions, ConfigFormat, DiffOptions, FilterCompiler, VERSION,
};

/// Hostlist Compiler - compiles filter lists into a single hostlist
#[derive(Parser, Debug)]
#[command(name = "hostlist-compiler")]
#[command(version = VERSION)]
#[command(about = "Compile filter-list sources into a normalized hostlist")]
#[command(long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to output file (stdout when omitted)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Force configuration format (json, yaml, toml)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<String>,

    /// Platform string for !#if conditionals
    #[arg(short, long, value_name = "PLATFORM", default_value = "")]
    platform: String,

    /// Skip sources that fail to fetch instead of aborting
    #[arg(long)]
    ignore_failed_sources: bool,

    /// Write compilation metrics as JSON to this path
    #[arg(long, value_name = "PATH")]
    metrics: Option<PathBuf>,

    /// Compare the fresh compile against a previous compiled list
    #[arg(long, value_name = "PATH")]
    diff_original: Option<PathBuf>,

    /// Diff report format (json, markdown)
    #[arg(long, value_name = "FORMAT", default_value = "json")]
    diff_format: String,

    /// Write the diff report to this path (stderr summary otherwise)
    #[arg(long, value_name = "PATH")]
    diff_output: Option<PathBuf>,

    /// Show version information
    #[arg(long = "version-info")]
    version_info: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    /// Show configuration only (don't compile)
    #[arg(long)]
    show_config: bool,
}

fn parse_format(format: &str) -> Option<ConfigFormat> {
    match format.to_lowercase().as_str() {
        "json" => Some(ConfigFormat::Json),
        "yaml" | "yml" => Some(ConfigFormat::Yaml),
        "toml" => Some(ConfigFormat::Toml),
        _ => None,
    }
}

fn show_version() {
    println!("Hostlist Compiler");
    println!("Version: {VERSION}");
    println!();
    println!("Platform Information:");
    println!("  OS: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);
}

fn find_default_config() -> Option<PathBuf> {
    let search_paths = [
        PathBuf::from("configuration.json"),
        PathBuf::from("hostlist-compiler.json"),
        PathBuf::from("hostlist-compiler.yaml"),
    ];

    search_paths.into_iter().find(|path| path.exists())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version_info {
        show_version();
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    // Determine config path
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => match find_default_config() {
            Some(path) => path,
            None => {
                eprintln!("[ERROR] Configuration file not found.");
                eprintln!("Searched:");
                eprintln!("  - configuration.json");
                eprintln!("  - hostlist-compiler.json");
                eprintln!("  - hostlist-compiler.yaml");
                eprintln!();
                eprintln!("Specify config path with -c/--config");
                return ExitCode::FAILURE;
            }
        },
    };

    let format = cli.format.as_deref().and_then(parse_format);

    let config = match read_config(&config_path, format) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] Failed to read configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.show_config {
        println!("Configuration: {}", config_path.display());
        println!();
        println!("  Name: {}", config.name);
        println!("  Version: {}", config.version.as_deref().unwrap_or("-"));
        println!("  License: {}", config.license.as_deref().unwrap_or("-"));
        println!("  Sources: {}", config.sources.len());
        println!("  Transformations: {}", config.transformations.join(", "));
        return ExitCode::SUCCESS;
    }

    tracing::info!("Starting compilation with config: {}", config_path.display());

    let options = CompilerOptions::default()
        .with_platform(cli.platform.clone())
        .with_ignore_failed_sources(cli.ignore_failed_sources);
    let compiler = match FilterCompiler::new(options) {
        Ok(compiler) => compiler,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match compiler.compile(&config).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("[ERROR] Compilation failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Emit the compiled list
    let text = result.text();
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, format!("{text}\n")) {
                eprintln!("[ERROR] Failed to write output: {e}");
                return ExitCode::FAILURE;
            }
            tracing::info!(
                "Wrote {} rules to {} (checksum {})",
                result.rule_count,
                path.display(),
                result.checksum
            );
        }
        None => println!("{text}"),
    }

    // Optional metrics artifact
    if let Some(path) = &cli.metrics {
        match serde_json::to_string_pretty(&result.metrics) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    eprintln!("[ERROR] Failed to write metrics: {e}");
                    return ExitCode::FAILURE;
                }
            }
            Err(e) => {
                eprintln!("[ERROR] Failed to serialize metrics: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    // Optional diff against a previous compiled list
    if let Some(original_path) = &cli.diff_original {
        let original = match std::fs::read_to_string(original_path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("[ERROR] Failed to read {}: {e}", original_path.display());
                return ExitCode::FAILURE;
            }
        };
        let original_lines: Vec<String> = original.lines().map(str::to_string).collect();
        let report = diff(&original_lines, &result.lines, &DiffOptions::default());

        let rendered = if cli.diff_format.eq_ignore_ascii_case("markdown") {
            Ok(report.to_markdown())
        } else {
            report.to_json()
        };
        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                eprintln!("[ERROR] Failed to render diff: {e}");
                return ExitCode::FAILURE;
            }
        };

        match &cli.diff_output {
            Some(path) => {
                if let Err(e) = std::fs::write(path, rendered) {
                    eprintln!("[ERROR] Failed to write diff: {e}");
                    return ExitCode::FAILURE;
                }
            }
            None => {
                eprintln!(
                    "[INFO] Diff vs {}: +{} -{} ({}% churn)",
                    original_path.display(),
                    report.summary.added,
                    report.summary.removed,
                    report.summary.percentage
                );
            }
        }
    }

    tracing::info!(
        "Done: {} rules in {}ms",
        result.rule_count,
        result.elapsed_ms
    );
    ExitCode::SUCCESS
}
