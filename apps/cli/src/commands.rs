//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use dochub_core::{
    ConversionJob, JobInput, JobKind, JobManager, JobOutput, JobParams, JobStatus, MarkdownFiles,
};
use dochub_markdown::validate_markdown;
use dochub_shared::{AppConfig, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocHub: convert between markdown and structured document blocks.
#[derive(Parser)]
#[command(
    name = "dochub",
    version,
    about = "Convert markdown files to structured document blocks and back.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert markdown files into block JSON.
    Convert {
        /// Markdown files to convert.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Convert a block JSON file back into markdown.
    Export {
        /// JSON array of blocks.
        blocks: PathBuf,

        /// Write markdown here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check a markdown file for problems without converting it.
    Validate {
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dochub=info",
        1 => "dochub=debug",
        _ => "dochub=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so exported markdown on stdout stays clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert { files, out } => cmd_convert(&files, out.as_deref()).await,
        Command::Export { blocks, out } => cmd_export(&blocks, out.as_deref()).await,
        Command::Validate { file } => cmd_validate(&file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_convert(files: &[PathBuf], out: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let manager = JobManager::new(MarkdownFiles::new(&config.defaults.workspace_root));
    let out_dir = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    let writer = MarkdownFiles::new(&out_dir);

    info!(count = files.len(), out = %out_dir.display(), "converting markdown files");

    let mut queued = Vec::with_capacity(files.len());
    for file in files {
        let path = std::path::absolute(file)
            .wrap_err_with(|| format!("cannot resolve {}", file.display()))?;
        let params = JobParams::new(JobInput::MarkdownFile { path })
            .with_options(config.conversion.clone());
        let job = manager.create_job(JobKind::MarkdownToBlocks, params).await?;
        queued.push((file, job.id));
    }

    let bar = ProgressBar::new(queued.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut failed = 0usize;
    for (file, id) in &queued {
        bar.set_message(file.display().to_string());
        let job = manager.wait(id).await?;
        bar.inc(1);

        match (&job.status, &job.result) {
            (JobStatus::Completed, Some(JobOutput::Blocks(result))) => {
                let name = output_name(file, "blocks.json");
                let json = serde_json::to_string_pretty(&result.content)?;
                let written = writer.write(&name, &json).await?;
                bar.println(format!(
                    "  {} -> {}: {}{}",
                    file.display(),
                    written.display(),
                    result.summary(),
                    elapsed(job.duration().map(|d| d.num_milliseconds()))
                ));
                for warning in &result.warnings {
                    bar.println(format!("    warning: {warning}"));
                }
                for error in &result.errors {
                    bar.println(format!("    error: {error}"));
                }
            }
            _ => {
                failed += 1;
                report_failure(&bar, file, &job);
            }
        }
    }
    bar.finish_and_clear();

    println!();
    println!("  Converted: {}", queued.len() - failed);
    println!("  Failed:    {failed}");
    println!("  Output:    {}", out_dir.display());
    println!();

    if failed > 0 {
        return Err(eyre!("{failed} of {} files failed to convert", queued.len()));
    }
    Ok(())
}

async fn cmd_export(blocks: &Path, out: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let manager = JobManager::new(MarkdownFiles::new(&config.defaults.workspace_root));

    let path = std::path::absolute(blocks)
        .wrap_err_with(|| format!("cannot resolve {}", blocks.display()))?;
    let params =
        JobParams::new(JobInput::BlocksFile { path }).with_options(config.conversion.clone());
    let job = manager.create_job(JobKind::BlocksToMarkdown, params).await?;
    let job = manager.wait(&job.id).await?;

    let result = match job.result {
        Some(JobOutput::Markdown(result)) if job.status == JobStatus::Completed => result,
        _ => {
            return Err(eyre!(
                "export of {} failed: {}",
                blocks.display(),
                job.error.as_deref().unwrap_or("unknown error")
            ));
        }
    };

    for warning in &result.warnings {
        warn!(%warning, "export warning");
    }

    match out {
        Some(out) => {
            let out = std::path::absolute(out)?;
            let written = MarkdownFiles::new(".").write(&out, &result.content).await?;
            println!("{} -> {}: {}", blocks.display(), written.display(), result.summary());
        }
        None => print!("{}", result.content),
    }
    Ok(())
}

async fn cmd_validate(file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .wrap_err_with(|| format!("cannot read {}", file.display()))?;
    let report = validate_markdown(&content);

    println!("{}: {} blocks", file.display(), report.block_count);
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for error in &report.errors {
        println!("  error: {error}");
    }

    if !report.valid {
        return Err(eyre!("{} is not valid markdown", file.display()));
    }
    println!("  valid");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `docs/guide.md` -> `guide.blocks.json`.
fn output_name(source: &Path, extension: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}.{extension}")
}

/// ` in 12 ms`, or nothing while the job has no finish time.
fn elapsed(millis: Option<i64>) -> String {
    millis.map(|ms| format!(" in {ms} ms")).unwrap_or_default()
}

fn report_failure(bar: &ProgressBar, file: &Path, job: &ConversionJob) {
    let reason = job.error.as_deref().unwrap_or("no result");
    warn!(file = %file.display(), job_id = %job.id, %reason, "conversion failed");
    bar.println(format!("  {} failed: {reason}", file.display()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_uses_file_stem() {
        assert_eq!(output_name(Path::new("docs/guide.md"), "blocks.json"), "guide.blocks.json");
        assert_eq!(output_name(Path::new("README"), "blocks.json"), "README.blocks.json");
    }

    #[test]
    fn elapsed_time_is_optional() {
        assert_eq!(elapsed(Some(42)), " in 42 ms");
        assert_eq!(elapsed(None), "");
    }

    #[test]
    fn cli_parses_convert_with_globals() {
        let cli = Cli::try_parse_from([
            "dochub", "-vv", "--log-format", "json", "convert", "a.md", "b.md", "--out", "build",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
        let Command::Convert { files, out } = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(out, Some(PathBuf::from("build")));
    }

    #[test]
    fn convert_requires_files() {
        assert!(Cli::try_parse_from(["dochub", "convert"]).is_err());
    }
}
