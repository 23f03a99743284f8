// # cloudplaned - cloudplane request runner
//
// A thin integration layer: it builds the provider configuration, registers
// every enabled provider crate and runs one lifecycle request against the
// registry. All resource logic lives in the provider crates.
//
// ## Usage
//
// ```bash
// cloudplaned request.json      # read the request from a file
// cloudplaned < request.json    # or from stdin
// cloudplaned --list            # print registered resource types
// ```
//
// The request is `{"resource", "operation", "id", "prior", "planned"}`; the
// resulting `{"id", "state"}` is printed to stdout. Logs go to stderr.
//
// ## Configuration
//
// - `CLOUDPLANE_CONFIG`: JSON configuration file (optional)
// - `CLOUDPLANE_API_KEY`: API key (required unless set in the file; always
//   takes precedence over the file)
// - `CLOUDPLANE_REGION`: Region (default: us-south)
// - `CLOUDPLANE_REQUEST_TIMEOUT_SECS`: HTTP timeout (1-300)
// - `CLOUDPLANE_POLL_DELAY_SECS`: Delay before the first status poll (0-600)
// - `CLOUDPLANE_POLL_INTERVAL_SECS`: Minimum poll interval (1-600)
// - `CLOUDPLANE_ON_PREM`: `true` for Power on-premises (Satellite) locations
// - `CLOUDPLANE_LOG_LEVEL`: trace, debug, info, warn, error (default: info)

use anyhow::{Context, Result};
use cloudplane_core::{ProviderConfig, Request, ResourceRegistry};
use std::env;
use std::io::Read;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: The request succeeded
/// - 1: Configuration or request error
/// - 2: The request failed at runtime
#[derive(Debug, Clone, Copy)]
enum CloudplaneExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<CloudplaneExitCode> for ExitCode {
    fn from(code: CloudplaneExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Run a request read from this file, or stdin when `None`
    Run(Option<String>),
    List,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args {
            [] => Ok(Command::Run(None)),
            [flag] if flag == "--list" => Ok(Command::List),
            [path] if path == "-" => Ok(Command::Run(None)),
            [path] if !path.starts_with("--") => Ok(Command::Run(Some(path.clone()))),
            _ => anyhow::bail!("Usage: cloudplaned [REQUEST_FILE | - | --list]"),
        }
    }
}

/// Runner configuration
#[derive(Debug)]
struct Config {
    provider: ProviderConfig,
    log_level: String,
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{name} has an invalid value: '{value}'")),
        None => Ok(None),
    }
}

impl Config {
    /// Load configuration from the process environment
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from `lookup`, layering variables over the
    /// optional `CLOUDPLANE_CONFIG` file
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut provider = match lookup("CLOUDPLANE_CONFIG") {
            Some(path) => ProviderConfig::from_file(&path)
                .with_context(|| format!("Failed to load CLOUDPLANE_CONFIG file {path}"))?,
            None => ProviderConfig::new(String::new(), "us-south"),
        };

        if let Some(key) = lookup("CLOUDPLANE_API_KEY") {
            provider.api_key = key;
        }
        if let Some(region) = lookup("CLOUDPLANE_REGION") {
            provider.region = region;
        }
        if let Some(secs) = parse_var(&lookup, "CLOUDPLANE_REQUEST_TIMEOUT_SECS")? {
            provider.request_timeout_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, "CLOUDPLANE_POLL_DELAY_SECS")? {
            provider.poll.delay_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, "CLOUDPLANE_POLL_INTERVAL_SECS")? {
            provider.poll.interval_secs = secs;
        }
        if let Some(on_prem) = parse_var(&lookup, "CLOUDPLANE_ON_PREM")? {
            provider.on_prem = on_prem;
        }

        Ok(Self {
            provider,
            log_level: lookup("CLOUDPLANE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.provider.api_key.trim().is_empty() {
            anyhow::bail!(
                "CLOUDPLANE_API_KEY is required. \
                Set it via: export CLOUDPLANE_API_KEY=your_key"
            );
        }

        let timeout = self.provider.request_timeout_secs;
        if !(1..=300).contains(&timeout) {
            anyhow::bail!(
                "CLOUDPLANE_REQUEST_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                timeout
            );
        }

        let delay = self.provider.poll.delay_secs;
        if delay > 600 {
            anyhow::bail!(
                "CLOUDPLANE_POLL_DELAY_SECS must be at most 600 seconds. Got: {}",
                delay
            );
        }

        let interval = self.provider.poll.interval_secs;
        if !(1..=600).contains(&interval) {
            anyhow::bail!(
                "CLOUDPLANE_POLL_INTERVAL_SECS must be between 1 and 600 seconds. Got: {}",
                interval
            );
        }

        self.log_level()?;
        self.provider.validate()?;
        Ok(())
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "CLOUDPLANE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Register every provider crate compiled in
fn build_registry(config: &ProviderConfig) -> Result<ResourceRegistry> {
    let registry = ResourceRegistry::new();

    #[cfg(feature = "power")]
    {
        info!("Registering Power provider");
        cloudplane_provider_power::register(&registry, config)?;
    }

    #[cfg(feature = "dns")]
    {
        info!("Registering DNS Services provider");
        cloudplane_provider_dns::register(&registry, config)?;
    }

    #[cfg(feature = "cis")]
    {
        info!("Registering CIS provider");
        cloudplane_provider_cis::register(&registry, config)?;
    }

    #[cfg(feature = "hpcs")]
    {
        info!("Registering HPCS provider");
        cloudplane_provider_hpcs::register(&registry, config)?;
    }

    Ok(registry)
}

fn read_request(source: Option<&str>) -> Result<Request> {
    let text = match source {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {path}"))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read request from stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("Request is not valid JSON")
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            return CloudplaneExitCode::ConfigError.into();
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CloudplaneExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return CloudplaneExitCode::ConfigError.into();
    }

    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CloudplaneExitCode::ConfigError.into();
    }

    let registry = match build_registry(&config.provider) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Provider registration failed: {:#}", e);
            return CloudplaneExitCode::ConfigError.into();
        }
    };

    let source = match command {
        Command::List => {
            for name in registry.list_resources() {
                println!("resource\t{name}");
            }
            for name in registry.list_data_sources() {
                println!("data\t{name}");
            }
            return CloudplaneExitCode::Success.into();
        }
        Command::Run(source) => source,
    };

    let request = match read_request(source.as_deref()) {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {:#}", e);
            return CloudplaneExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CloudplaneExitCode::RuntimeError.into();
        }
    };

    info!("Running {} {}", request.operation, request.resource);
    let result = rt.block_on(registry.execute(request));

    match result.map_err(anyhow::Error::from).and_then(|outcome| {
        serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")
    }) {
        Ok(json) => {
            println!("{json}");
            CloudplaneExitCode::Success.into()
        }
        Err(e) => {
            error!("Request failed: {:#}", e);
            CloudplaneExitCode::RuntimeError.into()
        }
    }
}
