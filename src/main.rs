use std::path::Path;

use clap::{CommandFactory, Parser};
use colored::*;

use csv_enrich_client::api::ApiClient;
use csv_enrich_client::cli::{Args, Command, RunArgs, API_KEY_ENV};
use csv_enrich_client::config::{ClientConfig, SubmitMode};
use csv_enrich_client::error::EnrichError;
use csv_enrich_client::logging;
use csv_enrich_client::notify::TerminalContainer;
use csv_enrich_client::runtime::Runtime;

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn run_cycle(config: ClientConfig, run: RunArgs) -> Result<(), EnrichError> {
    let mode = config.submit_mode;
    let mut runtime = Runtime::new(config, Box::new(TerminalContainer));

    runtime.refresh_quota().await;
    if let Some(quota) = runtime.controller().view().quota {
        eprintln!("{}", quota.to_string().bright_black());
    }

    match runtime.connect().await {
        Ok(()) => {}
        // Progress pushes are optional when the result comes back over HTTP.
        Err(e) if mode == SubmitMode::Http => {
            eprintln!("{} {} (continuing without live progress)", "warning:".bright_yellow().bold(), e);
        }
        Err(e) => return Err(e),
    }

    let upload = runtime.upload(&run.file).await?;
    eprintln!(
        "{} {} rows, columns: {}",
        "Loaded".bright_cyan().bold(),
        upload.row_count,
        upload.columns.join(", ")
    );

    let fields = run.form_fields(std::env::var(API_KEY_ENV).ok());
    let result = runtime.submit(fields).await;
    runtime.shutdown().await;

    let path = result?;
    println!("{}", path.display());
    Ok(())
}

async fn upload_only(config: ClientConfig, file: &Path) -> Result<(), EnrichError> {
    let api = ApiClient::new(config);
    let upload = api.upload(file).await?;
    println!("{} {}", "file:".bold(), upload.filename.as_deref().unwrap_or(&upload.file_path));
    println!("{} {}", "server path:".bold(), upload.file_path);
    println!("{} {}", "rows:".bold(), upload.row_count);
    println!("{} {}", "columns:".bold(), upload.columns.join(", "));
    Ok(())
}

async fn quota(config: ClientConfig) -> Result<(), EnrichError> {
    let api = ApiClient::new(config);
    match api.scrape_quota().await? {
        Some(quota) => println!("{quota}"),
        None => println!("{}", "quota unavailable".bright_black()),
    }
    Ok(())
}

/// Dispatch one parsed command line.
async fn execute(args: Args) -> Result<(), EnrichError> {
    if let Command::Completions { shell } = &args.command {
        clap_complete::generate(*shell, &mut Args::command(), "csv-enrich", &mut std::io::stdout());
        return Ok(());
    }

    let config = args.client_config()?;
    match args.command {
        Command::Run(run) => run_cycle(config, run).await,
        Command::Upload { file } => upload_only(config, &file).await,
        Command::Quota => quota(config).await,
        Command::Completions { .. } => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.verbose);
    execute(args).await?;
    Ok(())
}
