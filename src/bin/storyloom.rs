#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use storyloom::config::PipelineConfig;
use storyloom::gateway::{ProviderGateway, TracingUsageSink};
use storyloom::pipeline::Pipeline;
use storyloom::report;
use storyloom::rubric::SceneRubric;
use storyloom::text_analysis::TextAnalyzer;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "storyloom", version, about = "Quality-gated short story generation")]
struct Cli {
    /// Also write logs to this file (no ANSI colors).
    #[arg(long, global = true, env = "STORYLOOM_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story from a prompt against OpenRouter
    Run {
        /// Story prompt; use --prompt-file for long prompts
        prompt: Option<String>,
        #[arg(long, conflicts_with = "prompt")]
        prompt_file: Option<PathBuf>,
        /// TOML pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "output")]
        out_dir: PathBuf,
        #[arg(long)]
        max_revisions: Option<u32>,
        #[arg(long)]
        min_revisions: Option<u32>,
    },
    /// Run the deterministic prose analyzers on a text file and print JSON
    Analyze {
        file: PathBuf,
        /// Target word count; 0 disables the length check
        #[arg(long, default_value_t = 0)]
        target: i64,
        /// Earlier scenes, for cross-scene repetition
        #[arg(long = "prior")]
        prior: Vec<PathBuf>,
        /// Story-specific terms exempt from cliché matching (names, places)
        #[arg(long = "allow")]
        allow: Vec<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Recompute composite score and approval for a rubric JSON file
    Score { rubric: PathBuf },
}

fn init_tracing(log_file: Option<&Path>) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storyloom=info"));
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    Ok(match path {
        Some(p) => PipelineConfig::load(p)?,
        None => PipelineConfig::default(),
    })
}

fn read_text(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()).into())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.log_file.as_deref()) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Run {
            prompt,
            prompt_file,
            config,
            out_dir,
            max_revisions,
            min_revisions,
        } => {
            let prompt = match (prompt, prompt_file) {
                (Some(p), _) => p,
                (None, Some(path)) => read_text(&path)?,
                (None, None) => return Err("a prompt or --prompt-file is required".into()),
            };
            let mut config = load_config(config.as_deref())?;
            if let Some(max) = max_revisions {
                config.revisions.max_revisions = max;
            }
            if let Some(min) = min_revisions {
                config.revisions.min_revisions = min;
            }

            let gateway = Arc::new(ProviderGateway::from_env(Arc::new(TracingUsageSink))?);
            let analyzer = Arc::new(TextAnalyzer::bundled()?);
            let pipeline = Pipeline::with_gateway(gateway, analyzer, config);

            let outcome = pipeline.run(&prompt).await?;
            let files = report::write_session(&out_dir, &outcome)?;

            println!(
                "{}: {} scenes, {} words, {} edit rounds",
                outcome.title(),
                outcome.state.scene_drafts.len(),
                outcome.total_words(),
                outcome.evaluations()
            );
            for fb in &outcome.state.edit_feedback {
                for line in report::feedback_entry_lines(fb, 200) {
                    println!("{line}");
                }
            }
            for line in report::scene_metrics_lines(&outcome.state.scene_metrics) {
                println!("{line}");
            }
            println!("session: {}", files.session.display());
            println!("report: {}", files.report.display());
            println!("manuscript: {}", files.manuscript.display());
        }
        Commands::Analyze {
            file,
            target,
            prior,
            allow,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let text = read_text(&file)?;
            let priors = prior
                .iter()
                .map(|p| read_text(p))
                .collect::<CliResult<Vec<_>>>()?;
            let allowlist: HashSet<String> = allow.iter().map(|t| t.trim().to_lowercase()).collect();

            let analyzer = TextAnalyzer::bundled()?;
            let report = analyzer.analyze(&text, target, &allowlist, &priors, &config);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Score { rubric } => {
            let rubric: SceneRubric = serde_json::from_str(&read_text(&rubric)?)?;
            let summary = serde_json::json!({
                "dimensions": rubric.dimension_summary(),
                "advisory_penalty": rubric.advisory_penalty(),
                "quality_score": rubric.compute_quality_score(),
                "critical_failure": rubric.has_critical_failure(),
                "approved": rubric.compute_approved(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
