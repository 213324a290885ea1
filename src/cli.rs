use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{ClientConfig, SubmitMode};
use crate::error::EnrichError;
use crate::protocol::AdditionalColumn;
use crate::validate::FormFields;

/// Environment variable consulted when `--api-key` is not given.
pub const API_KEY_ENV: &str = "ENRICH_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "csv-enrich")]
#[command(version)]
#[command(about = "Upload a CSV, enrich it with a language model and download the result")]
pub struct Args {
    /// Base URL of the enrichment service (overrides the config file)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory the result CSV is written to
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    /// Cookie header for an authenticated session, e.g. "session=..."
    #[arg(long, global = true)]
    pub cookie: Option<String>,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, upload, process and download in one go
    Run(RunArgs),

    /// Upload a file and print what the server saw
    Upload {
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the scrape quota of the current session
    Quota,

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// CSV file to enrich
    #[arg(long)]
    pub file: PathBuf,

    /// Prompt applied to every row
    #[arg(long)]
    pub instructions: String,

    /// Model identifier passed through to the service
    #[arg(long)]
    pub model: String,

    /// API key for the model provider (falls back to $ENRICH_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Process at most this many rows
    #[arg(long)]
    pub row_limit: Option<String>,

    /// Extra output column as NAME=INSTRUCTIONS; repeatable
    #[arg(long = "column", value_parser = parse_column)]
    pub columns: Vec<AdditionalColumn>,

    /// Use POST /process instead of the socket event
    #[arg(long)]
    pub http: bool,
}

/// Parse `NAME=INSTRUCTIONS`. Empty halves are left for form validation.
pub fn parse_column(raw: &str) -> Result<AdditionalColumn, String> {
    let (name, instructions) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=INSTRUCTIONS, got '{raw}'"))?;
    Ok(AdditionalColumn {
        name: name.trim().to_string(),
        instructions: instructions.trim().to_string(),
    })
}

/// Flag value first, then the environment, else empty (caught by validation).
pub fn resolve_api_key(flag: Option<&str>, env: Option<String>) -> String {
    flag.map(str::to_string).or(env).unwrap_or_default()
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn client_config(&self) -> Result<ClientConfig, EnrichError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(cookie) = &self.cookie {
            config.session_cookie = Some(cookie.clone());
        }
        if let Command::Run(run) = &self.command {
            if run.http {
                config.submit_mode = SubmitMode::Http;
            }
        }
        config.validated()
    }
}

impl RunArgs {
    /// Form snapshot for this run. `file_path` is filled in after upload.
    pub fn form_fields(&self, env_api_key: Option<String>) -> FormFields {
        FormFields {
            api_key: resolve_api_key(self.api_key.as_deref(), env_api_key),
            instructions: self.instructions.clone(),
            file_path: None,
            model: Some(self.model.clone()),
            row_limit: self.row_limit.clone(),
            additional_columns: self.columns.clone(),
        }
    }
}
