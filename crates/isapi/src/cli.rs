//! Clap derive structures for the `isapi` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// isapi -- talk to ISAPI-style cameras and recorders
#[derive(Debug, Parser)]
#[command(
    name = "isapi",
    version,
    about = "Query and configure ISAPI cameras and recorders from the command line",
    long_about = "Negotiates digest / basic authentication with the device, then \n\
        issues requests against its ISAPI tree. XML responses are printed as \n\
        JSON unless --text is given.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "ISAPI_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device address (overrides profile)
    #[arg(long, env = "ISAPI_HOST", global = true)]
    pub host: Option<String>,

    /// Username (overrides profile)
    #[arg(long, short = 'u', env = "ISAPI_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password (overrides profile, keyring and config)
    #[arg(long, env = "ISAPI_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "ISAPI_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ISAPI_INSECURE", global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ISAPI_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Indented `key: value` lines
    Text,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print System/status
    Status,

    /// GET an endpoint
    Get(GetArgs),

    /// Send a PUT, POST or DELETE to an endpoint
    Send(SendArgs),

    /// Read events from a multipart alert stream
    Events(EventsArgs),

    /// Save a binary endpoint (snapshot, recording) to a file
    #[command(alias = "dl")]
    Download(DownloadArgs),

    /// Health report: reachability, device time, cameras
    Probe,

    /// Inspect CLI configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Path segments below the API prefix, e.g. `System deviceInfo`
    #[arg(required = true, num_args = 1..)]
    pub segments: Vec<String>,

    /// Print the raw body instead of converting XML
    #[arg(long)]
    pub text: bool,

    /// Query parameter, repeatable
    #[arg(long, short = 'q', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// HTTP method, e.g. PUT
    pub method: String,

    /// Path segments below the API prefix
    #[arg(required = true, num_args = 1..)]
    pub segments: Vec<String>,

    /// File whose contents become the request body
    #[arg(long, short = 'b')]
    pub body: Option<PathBuf>,

    /// Print the raw body instead of converting XML
    #[arg(long)]
    pub text: bool,

    /// Query parameter, repeatable
    #[arg(long, short = 'q', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Number of events to collect before returning
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Stream path segments
    #[arg(default_values_t = ["Event".to_owned(), "notification".to_owned(), "alertStream".to_owned()])]
    pub segments: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Path segments below the API prefix
    #[arg(required = true, num_args = 1..)]
    pub segments: Vec<String>,

    /// Destination file
    #[arg(long, short = 'O')]
    pub out: PathBuf,

    /// Query parameter, repeatable
    #[arg(long, short = 'q', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration with passwords redacted
    Show,
    /// Print the config file path
    Path,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}
