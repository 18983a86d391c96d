use clap::{CommandFactory, Parser};
use spanfuse::config::LogFormat;
use spanfuse_cli::commands::Commands;
use spanfuse_cli::handlers::*;
use spanfuse_cli::{CliContext, LogOverrides, OutputFormat, format_info, output_error};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "spanfuse")]
#[command(version = spanfuse::VERSION)]
#[command(about = "Threshold, ensemble and postprocess NER span predictions")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); default locations are searched otherwise
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output format for results and errors
    #[arg(long, short, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Verbose output (debug level logging)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log format (default, json, compact, pretty, dev)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let output_format = cli.output;

    match run(cli, output_format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output_error(&e, output_format);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output_format: OutputFormat) -> spanfuse::Result<()> {
    match &cli.command {
        Commands::Version => {
            println!("spanfuse v{}", spanfuse::VERSION);
            return Ok(());
        }
        Commands::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "spanfuse",
                &mut std::io::stdout(),
            );
            return Ok(());
        }
        _ => {}
    }

    let overrides = LogOverrides {
        verbose: cli.verbose,
        quiet: cli.quiet,
        format: cli.log_format,
    };
    let ctx = CliContext::load(cli.config.as_deref(), &overrides, output_format)?;
    let _log_guard = spanfuse::logging::init(&ctx.config.logging)?;

    if let Some(path) = &ctx.config_path {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }

    match cli.command {
        Commands::Infer(args) => handle_infer(args, &ctx).await,
        Commands::Threshold(args) => handle_threshold(args, &ctx),
        Commands::CombineRecallPrecision(args) => handle_combine_recall_precision(args, &ctx),
        Commands::CombinePeers(args) => handle_combine_peers(args, &ctx),
        Commands::CombineEnsembles(args) => handle_combine_ensembles(args, &ctx),
        Commands::Rules(args) => handle_rules(args, &ctx),
        Commands::Strip(args) => handle_strip(args, &ctx),
        Commands::Run(args) => handle_run(args, &ctx).await,
        Commands::Config => {
            if output_format == OutputFormat::Text {
                let source = ctx
                    .config_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "built-in defaults".to_string());
                eprintln!("{}", format_info(&format!("Configuration from {source}")));
            }
            let json = serde_json::to_string_pretty(&ctx.config)
                .map_err(|e| spanfuse::SpanfuseError::Other(e.to_string()))?;
            println!("{json}");
            Ok(())
        }
        Commands::Version | Commands::Completions(_) => Ok(()),
    }
}
