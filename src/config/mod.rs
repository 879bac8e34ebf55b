//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "penwright";
const ENV_PREFIX: &str = "PENWRIGHT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_API_VERSION: &str = "2021-10-21";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REVALIDATE_SECS: u64 = 60;
const DEFAULT_NOT_FOUND_CAPACITY: usize = 1024;
const DEFAULT_GENERATION_CONCURRENCY: usize = 4;

/// Command-line arguments for the penwright binary.
#[derive(Debug, Parser)]
#[command(
    name = "penwright",
    version,
    about = "Blog front end with incrementally regenerated pages"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PENWRIGHT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Prerender known posts and run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Prerender every post to static HTML files.
    Generate(GenerateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Directory that receives `posts/<slug>/index.html`.
    #[arg(long = "out-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub out_dir: PathBuf,

    /// Override the number of pages rendered at once.
    #[arg(long = "concurrency", value_name = "COUNT")]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverrides {
    /// Override the content project id.
    #[arg(long = "content-project-id", value_name = "ID")]
    pub project_id: Option<String>,

    /// Override the content dataset.
    #[arg(long = "content-dataset", value_name = "NAME")]
    pub dataset: Option<String>,

    /// Serve content from a TOML fixture instead of the remote API.
    #[arg(long = "content-fixture", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub fixture_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override how long a generated page stays fresh.
    #[arg(long = "revalidate-seconds", value_name = "SECONDS")]
    pub revalidate_seconds: Option<u64>,

    /// Toggle prerendering known posts before listening.
    #[arg(
        long = "prerender",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub prerender: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub revalidate: RevalidateSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    pub use_cdn: bool,
    /// Write token. Without it the backend is read-only.
    pub token: Option<String>,
    pub request_timeout: Duration,
    pub fixture_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RevalidateSettings {
    pub interval: Duration,
    /// How many never-found slugs are remembered before eviction.
    pub not_found_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub prerender_on_startup: bool,
    pub concurrency: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Generate(args)) => raw.apply_generate_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    revalidate: RawRevalidateSettings,
    generation: RawGenerationSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.revalidate_seconds {
            self.revalidate.interval_seconds = Some(seconds);
        }
        if let Some(prerender) = overrides.prerender {
            self.generation.prerender_on_startup = Some(prerender);
        }

        self.apply_content_overrides(&overrides.content);
    }

    fn apply_generate_overrides(&mut self, args: &GenerateArgs) {
        if let Some(concurrency) = args.concurrency {
            self.generation.concurrency = Some(concurrency);
        }

        self.apply_content_overrides(&args.content);
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(project_id) = overrides.project_id.as_ref() {
            self.content.project_id = Some(project_id.clone());
        }
        if let Some(dataset) = overrides.dataset.as_ref() {
            self.content.dataset = Some(dataset.clone());
        }
        if let Some(path) = overrides.fixture_path.as_ref() {
            self.content.fixture_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            revalidate,
            generation,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            content: build_content_settings(content)?,
            revalidate: build_revalidate_settings(revalidate)?,
            generation: build_generation_settings(generation)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let fixture_path = content
        .fixture_path
        .filter(|path| !path.as_os_str().is_empty());

    let project_id = non_blank(content.project_id);
    let dataset = non_blank(content.dataset);

    // A fixture stands in for the remote project entirely.
    let (project_id, dataset) = match (project_id, dataset, fixture_path.is_some()) {
        (Some(project_id), Some(dataset), _) => (project_id, dataset),
        (project_id, dataset, true) => (
            project_id.unwrap_or_else(|| "fixture".to_string()),
            dataset.unwrap_or_else(|| "fixture".to_string()),
        ),
        (None, _, false) => {
            return Err(LoadError::invalid(
                "content.project_id",
                "required unless content.fixture_path is set",
            ));
        }
        (_, None, false) => {
            return Err(LoadError::invalid(
                "content.dataset",
                "required unless content.fixture_path is set",
            ));
        }
    };

    if !project_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    {
        return Err(LoadError::invalid(
            "content.project_id",
            "may only contain letters, digits and dashes",
        ));
    }

    let api_version =
        non_blank(content.api_version).unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

    let timeout_secs = content
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "content.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ContentSettings {
        project_id,
        dataset,
        api_version,
        use_cdn: content.use_cdn.unwrap_or(true),
        token: non_blank(content.token),
        request_timeout: Duration::from_secs(timeout_secs),
        fixture_path,
    })
}

fn build_revalidate_settings(
    revalidate: RawRevalidateSettings,
) -> Result<RevalidateSettings, LoadError> {
    let seconds = revalidate
        .interval_seconds
        .unwrap_or(DEFAULT_REVALIDATE_SECS);
    if seconds == 0 {
        return Err(LoadError::invalid(
            "revalidate.interval_seconds",
            "must be greater than zero",
        ));
    }

    let not_found_capacity = revalidate
        .not_found_capacity
        .unwrap_or(DEFAULT_NOT_FOUND_CAPACITY);
    if not_found_capacity == 0 {
        return Err(LoadError::invalid(
            "revalidate.not_found_capacity",
            "must be greater than zero",
        ));
    }

    Ok(RevalidateSettings {
        interval: Duration::from_secs(seconds),
        not_found_capacity,
    })
}

fn build_generation_settings(
    generation: RawGenerationSettings,
) -> Result<GenerationSettings, LoadError> {
    let concurrency = generation
        .concurrency
        .unwrap_or(DEFAULT_GENERATION_CONCURRENCY);
    if concurrency == 0 {
        return Err(LoadError::invalid(
            "generation.concurrency",
            "must be greater than zero",
        ));
    }

    Ok(GenerationSettings {
        prerender_on_startup: generation.prerender_on_startup.unwrap_or(true),
        concurrency,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    project_id: Option<String>,
    dataset: Option<String>,
    api_version: Option<String>,
    use_cdn: Option<bool>,
    token: Option<String>,
    request_timeout_seconds: Option<u64>,
    fixture_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRevalidateSettings {
    interval_seconds: Option<u64>,
    not_found_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGenerationSettings {
    prerender_on_startup: Option<bool>,
    concurrency: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
