use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use kork_http::config::{ClientConfig, DEFAULT_TIMEOUT_SECS, DecoderKind};
use kork_http::http::{MAX_ATTEMPTS, RETRY_DELAY_MS};
use kork_http::{ErrorReport, FailedResponse};
use log::debug;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;

/// kork-http - HTTP calls with classified errors
///
/// Fetch a URL and report failures as classified errors, or classify a
/// response offline.
///
/// Examples:
///   kork-http get https://example.com/api/foo
///   kork-http classify --status 404 --body '{"message": "Not Found"}'
#[derive(Parser, Debug)]
#[command(author, version = env!("KORK_HTTP_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL for relative targets
    #[arg(long = "base-url", env = "KORK_HTTP_BASE_URL", value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "KORK_HTTP_TOKEN", value_name = "TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// How error bodies are decoded
    #[arg(long, value_enum, default_value_t = DecoderKind::Map, global = true)]
    decoder: DecoderKind,

    /// Attempts per request, including the first one
    #[arg(long = "max-attempts", value_name = "N", default_value_t = MAX_ATTEMPTS, global = true)]
    max_attempts: u32,

    /// Delay before the first retry
    #[arg(long = "retry-delay-ms", value_name = "MS", default_value_t = RETRY_DELAY_MS, global = true)]
    retry_delay_ms: u64,

    /// Request timeout
    #[arg(long = "timeout-secs", value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// GET a URL and print the JSON response
    Get(GetArgs),

    /// Classify a failed response without making a request
    Classify(ClassifyArgs),
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    /// Absolute URL, or a path relative to --base-url
    #[arg(value_name = "TARGET")]
    target: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", short = 'q', value_name = "KEY=VALUE", value_parser = parse_query)]
    query: Vec<(String, String)>,

    /// Write the response body to a file instead of printing JSON
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ClassifyArgs {
    /// HTTP status code
    #[arg(long, value_name = "CODE")]
    status: u16,

    /// Response body
    #[arg(long, value_name = "BODY")]
    body: Option<String>,

    /// URL the response came from
    #[arg(long, value_name = "URL", default_value = "")]
    url: String,
}

fn parse_query(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env();
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url)?;
        }
        if let Some(token) = self.token.clone().filter(|t| !t.is_empty()) {
            config.token = Some(token);
        }
        config.decoder = self.decoder;
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.retry.max_attempts = self.max_attempts;
        config.retry.initial_delay = Duration::from_millis(self.retry_delay_ms);
        Ok(config)
    }
}

async fn get(config: &ClientConfig, args: &GetArgs) -> Result<()> {
    let url = config.resolve_url(&args.target)?;
    let client = config.build()?;
    debug!(
        "GET {} with up to {} attempts",
        url,
        client.retry_config().max_attempts
    );
    let query: Vec<(&str, &str)> = args
        .query
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let result = match &args.output {
        Some(path) => client
            .download_file_with_query(url.as_str(), &query, || std::fs::File::create(path))
            .await
            .map(|bytes| {
                println!("{} bytes written to {}", bytes, path.display());
            }),
        None => client
            .get_json_with_query::<serde_json::Value>(url.as_str(), &query)
            .await
            .map(|value| {
                println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            }),
    };

    result.map_err(|e| {
        if let Ok(report) = serde_json::to_string(&e.report()) {
            eprintln!("{}", report);
        }
        anyhow!(e)
    })
}

fn classify(config: &ClientConfig, args: &ClassifyArgs) -> Result<()> {
    let status = StatusCode::from_u16(args.status)
        .with_context(|| format!("Invalid HTTP status {}", args.status))?;
    if !status.is_client_error() && !status.is_server_error() {
        bail!(
            "Status {} is not an error status; only 4xx and 5xx responses are classified",
            status.as_u16()
        );
    }
    let response = FailedResponse::new(status, args.url.as_str())
        .with_body(args.body.clone().unwrap_or_default());

    let error = config.decoder.classifier().classify(&response);
    println!("{}", serde_json::to_string(&ErrorReport::from(&error))?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = cli.client_config()?;

    match &cli.command {
        Commands::Get(args) => get(&config, args).await?,
        Commands::Classify(args) => classify(&config, args)?,
    }
    Ok(())
}
