use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Attribute, Cell, Table};
use paper_talker::config::{default_config_path, load_config, Config, ConfigFile};
use paper_talker::models::ResumeHandle;
use paper_talker::notebook::{GatewayClient, NotebookClient, ResearchMode, VideoStyle};
use paper_talker::sources::ProviderRegistry;
use paper_talker::ui::{self, Theme};
use paper_talker::workflow::{
    aggregate_with_report, RunOptions, RunResult, SourceMode, Workflow, WorkflowSettings,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PaperTalker - turn a research topic into a notebook video
#[derive(Parser, Debug)]
#[command(name = "paper-talker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Gather sources for a topic, import them into a notebook and generate a video", long_about = None)]
#[command(after_help = "Examples:
  paper-talker \"biological agents\"
  paper-talker \"protein folding\" --source search --platforms arxiv pubmed --year 2024
  paper-talker \"quantum computing\" --source upload
  paper-talker \"LLM\" --source mixed --style anime --no-confirm
  paper-talker --resume NOTEBOOK_ID TASK_ID")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic of the video
    topic: Option<String>,

    /// Where sources come from
    #[arg(long, value_enum, default_value_t = SourceMode::Research)]
    source: SourceMode,

    /// Video style
    #[arg(long, value_enum)]
    style: Option<VideoStyle>,

    /// Video language
    #[arg(long)]
    lang: Option<String>,

    /// Deep research mode
    #[arg(long, value_enum)]
    mode: Option<ResearchMode>,

    /// Search providers (default: arxiv semantic_scholar)
    #[arg(long, num_args = 1..)]
    platforms: Option<Vec<String>>,

    /// Maximum results per provider
    #[arg(long)]
    max_results: Option<usize>,

    /// Only papers published in this year
    #[arg(long)]
    year: Option<i32>,

    /// Output directory
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seconds to wait for the video
    #[arg(long)]
    timeout: Option<u64>,

    /// Video instructions (overrides the prompt file)
    #[arg(long)]
    instructions: Option<String>,

    /// Skip confirmations
    #[arg(long)]
    no_confirm: bool,

    /// Resume tracking a video job that timed out
    #[arg(long, num_args = 2, value_names = ["NOTEBOOK_ID", "TASK_ID"])]
    resume: Option<Vec<String>>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search providers only and print the results
    Search {
        query: String,

        /// Providers to query
        #[arg(long, num_args = 1..)]
        platforms: Option<Vec<String>>,

        /// Maximum results per provider
        #[arg(long)]
        max_results: Option<usize>,

        /// Only papers published in this year
        #[arg(long)]
        year: Option<i32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the search providers and whether they can be used
    Providers,

    /// Write a default configuration file
    InitConfig {
        /// Target path (default: the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_talker={}", level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&cli, &config);

    let theme = Theme::detect();
    let registry = ProviderRegistry::new(config.provider_settings());

    match &cli.command {
        Some(Commands::Search {
            query,
            platforms,
            max_results,
            year,
            json,
        }) => {
            let platforms = platforms.clone().unwrap_or_else(|| config.search.platforms.clone());
            let unknown = registry.unknown(&platforms);
            if !unknown.is_empty() {
                theme.warn(&format!("Unknown providers: {}", unknown.join(", ")));
            }

            let aggregation = aggregate_with_report(
                &registry,
                query,
                &platforms,
                max_results.unwrap_or(config.search.max_results),
                year.or(config.search.year),
            )
            .await;

            if *json {
                println!("{}", serde_json::to_string_pretty(&aggregation)?);
            } else {
                for report in &aggregation.reports {
                    match &report.error {
                        None => theme.ok(&format!("{}: {} results", report.provider, report.count)),
                        Some(e) => theme.warn(&format!("{}: {}", report.provider, e)),
                    }
                }
                ui::print_sources_table(&theme, &aggregation.records, "Results");
            }
            Ok(ExitCode::SUCCESS)
        }

        Some(Commands::Providers) => {
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Provider", "Name", "Status"]);
            for id in registry.names() {
                let (name, status) = match registry.create(id) {
                    Ok(provider) => (provider.name().to_string(), "available".to_string()),
                    Err(e) => (String::new(), e.to_string()),
                };
                table.add_row(vec![
                    Cell::new(id).add_attribute(Attribute::Bold),
                    Cell::new(name),
                    Cell::new(status),
                ]);
            }
            println!("{table}");
            Ok(ExitCode::SUCCESS)
        }

        Some(Commands::InitConfig { path, force }) => {
            let path = match path.clone().or_else(default_config_path) {
                Some(path) => path,
                None => bail!("Could not determine the user config directory; pass --path"),
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ConfigFile::create_default(&path).save()?;
            theme.ok(&format!("Wrote {}", path.display()));
            Ok(ExitCode::SUCCESS)
        }

        None => run(&cli.run, &config, registry, theme).await,
    }
}

async fn run(
    args: &RunArgs,
    config: &Config,
    registry: ProviderRegistry,
    theme: Theme,
) -> Result<ExitCode> {
    let client: Arc<dyn NotebookClient> = Arc::new(GatewayClient::new(
        config.gateway.base_url.clone(),
        config.gateway.api_token.clone(),
        config.request_timeout(),
    )?);

    let settings = WorkflowSettings {
        import: config.import_settings(),
        research: config.research_settings(),
        tracker: config.tracker_config(),
        prompt_file: Some(config.video.prompt_file.clone()),
    };
    let workflow = Workflow::new(client, registry, settings, theme);

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.tracking.timeout_secs));

    let result = if let Some(pair) = &args.resume {
        let handle = match pair.as_slice() {
            [notebook_id, task_id] => ResumeHandle::new(notebook_id, task_id),
            _ => bail!("--resume takes NOTEBOOK_ID TASK_ID"),
        };
        let topic = args.topic.as_deref().unwrap_or("resume");
        workflow.resume(&handle, topic, &output_dir, timeout).await
    } else {
        let Some(topic) = args.topic.clone() else {
            bail!("A topic is required (or use --resume NOTEBOOK_ID TASK_ID)");
        };
        let options = RunOptions {
            topic,
            source_mode: args.source,
            style: args.style.unwrap_or(config.video.style),
            language: args
                .lang
                .clone()
                .unwrap_or_else(|| config.video.language.clone()),
            research_mode: args.mode.unwrap_or(config.research.mode),
            platforms: args
                .platforms
                .clone()
                .unwrap_or_else(|| config.search.platforms.clone()),
            max_results: args.max_results.unwrap_or(config.search.max_results),
            year: args.year.or(config.search.year),
            output_dir,
            timeout,
            instructions: args.instructions.clone(),
            no_confirm: args.no_confirm,
        };
        workflow.run(&options).await
    };

    match result {
        Ok(RunResult::Completed { .. }) => Ok(ExitCode::SUCCESS),
        Ok(_) => Ok(ExitCode::FAILURE),
        Err(e) => {
            tracing::error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "paper-talker",
            "protein folding",
            "--source",
            "mixed",
            "--style",
            "retro_print",
            "--platforms",
            "arxiv",
            "pubmed",
            "--year",
            "2024",
            "--no-confirm",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.topic.as_deref(), Some("protein folding"));
        assert_eq!(cli.run.source, SourceMode::Mixed);
        assert_eq!(cli.run.style, Some(VideoStyle::RetroPrint));
        assert_eq!(
            cli.run.platforms,
            Some(vec!["arxiv".to_string(), "pubmed".to_string()])
        );
        assert_eq!(cli.run.year, Some(2024));
        assert!(cli.run.no_confirm);
    }

    #[test]
    fn test_parse_resume() {
        let cli = Cli::try_parse_from(["paper-talker", "--resume", "nb-1", "task-2"]).unwrap();
        assert_eq!(
            cli.run.resume,
            Some(vec!["nb-1".to_string(), "task-2".to_string()])
        );
        assert!(Cli::try_parse_from(["paper-talker", "--resume", "nb-1"]).is_err());
    }

    #[test]
    fn test_parse_search_subcommand() {
        let cli = Cli::try_parse_from(["paper-talker", "search", "gan", "--json", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Some(Commands::Search { json: true, .. })));
    }
}
