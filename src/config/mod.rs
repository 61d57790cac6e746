//! Configuration layer: typed settings with layered precedence (file → env → CLI).
//!
//! Settings are resolved and validated once at startup into an immutable
//! [`Settings`] value that is handed to each component explicitly.

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "verbalize";
const ENV_PREFIX: &str = "VERBALIZE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 8080;
const DEFAULT_ADMIN_PORT: u16 = 8081;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_QUERY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SITE_TITLE: &str = "Verbalize";
const DEFAULT_THEME: &str = "default";
const DEFAULT_MORE_TAG: &str = "<!--more-->";
const DEFAULT_ENTRIES_PER_PAGE: usize = 5;
const DEFAULT_ADMIN_ENTRIES_PER_PAGE: usize = 50;
const DEFAULT_CACHE_CONTROL: &str = "public, max-age=300";
const DEFAULT_AUTHOR: &str = "admin";
const DEFAULT_CACHE_CAPACITY: usize = 512;
const DEFAULT_PAGE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_OPERATION_TIMEOUT_MS: u64 = 250;
const DEFAULT_SNIPPET_TTL_SECS: u64 = 3_600;
const DEFAULT_SNIPPET_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SNIPPET_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_USER_AGENT: &str = concat!("verbalize/", env!("CARGO_PKG_VERSION"));

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
    pub cache: CacheSettings,
    pub snippets: SnippetSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
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
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub query_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub theme: String,
    /// Path prefix the site is mounted under, without a trailing slash.
    pub subdirectory: String,
    /// Deployment identifier namespacing every cached page.
    pub version: String,
    pub more_tag: String,
    pub entries_per_page: NonZeroUsize,
    pub admin_entries_per_page: NonZeroUsize,
    pub cache_control_header: String,
    pub default_author: String,
    pub disqus_id: Option<String>,
    pub analytics_id: Option<String>,
    pub analytics_domain: Option<String>,
    /// Target date (`M/D/YYYY`) for the countdown shown by themes.
    pub countdown: Option<String>,
    pub embeds: Vec<EmbedSettings>,
}

/// A named fragment of an external document embedded into every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedSettings {
    pub name: String,
    pub url: String,
    pub start_token: String,
    pub end_token: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub page_ttl: Duration,
    pub operation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SnippetSettings {
    pub ttl: Duration,
    pub request_timeout: Duration,
    pub max_body_bytes: NonZeroUsize,
    pub user_agent: String,
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
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Settings built purely from built-in defaults, ignoring files, environment and CLI.
pub fn load_defaults() -> Result<Settings, LoadError> {
    Settings::from_raw(RawSettings::default())
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
    database: RawDatabaseSettings,
    site: RawSiteSettings,
    cache: RawCacheSettings,
    snippets: RawSnippetSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(count) = overrides.entries_per_page {
            self.site.entries_per_page = Some(count);
        }
        if let Some(version) = overrides.site_version.as_ref() {
            self.site.version = Some(version.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
            cache,
            snippets,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            site: build_site_settings(site)?,
            cache: build_cache_settings(cache)?,
            snippets: build_snippet_settings(snippets)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

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
        public_addr,
        admin_addr,
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    let query_timeout = positive_millis(
        database.query_timeout_ms,
        DEFAULT_DB_QUERY_TIMEOUT_MS,
        "database.query_timeout_ms",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        query_timeout,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let subdirectory = normalize_subdirectory(site.subdirectory.as_deref().unwrap_or(""));
    if subdirectory.contains(char::is_whitespace) {
        return Err(LoadError::invalid(
            "site.subdirectory",
            "must not contain whitespace",
        ));
    }

    let version = non_blank(site.version).unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    let more_tag = site.more_tag.unwrap_or_else(|| DEFAULT_MORE_TAG.to_string());
    if more_tag.is_empty() {
        return Err(LoadError::invalid("site.more_tag", "must not be empty"));
    }

    let entries_per_page = non_zero_usize(
        site.entries_per_page.unwrap_or(DEFAULT_ENTRIES_PER_PAGE),
        "site.entries_per_page",
    )?;
    let admin_entries_per_page = non_zero_usize(
        site.admin_entries_per_page
            .unwrap_or(DEFAULT_ADMIN_ENTRIES_PER_PAGE),
        "site.admin_entries_per_page",
    )?;

    let embeds = site
        .embeds
        .into_iter()
        .map(build_embed_settings)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SiteSettings {
        title: site.title.unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        subtitle: site.subtitle.unwrap_or_default(),
        description: site.description.unwrap_or_default(),
        theme: site.theme.unwrap_or_else(|| DEFAULT_THEME.to_string()),
        subdirectory,
        version,
        more_tag,
        entries_per_page,
        admin_entries_per_page,
        cache_control_header: site
            .cache_control_header
            .unwrap_or_else(|| DEFAULT_CACHE_CONTROL.to_string()),
        default_author: non_blank(site.default_author)
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        disqus_id: non_blank(site.disqus_id),
        analytics_id: non_blank(site.analytics_id),
        analytics_domain: non_blank(site.analytics_domain),
        countdown: non_blank(site.countdown),
        embeds,
    })
}

fn build_embed_settings(embed: RawEmbedSettings) -> Result<EmbedSettings, LoadError> {
    let name = non_blank(embed.name)
        .ok_or_else(|| LoadError::invalid("site.embeds.name", "must not be empty"))?;
    let url = non_blank(embed.url)
        .ok_or_else(|| LoadError::invalid("site.embeds.url", "must not be empty"))?;
    url::Url::parse(&url).map_err(|err| {
        LoadError::invalid("site.embeds.url", format!("`{url}` is not a URL: {err}"))
    })?;
    let start_token = embed
        .start_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| LoadError::invalid("site.embeds.start_token", "must not be empty"))?;
    let end_token = embed
        .end_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| LoadError::invalid("site.embeds.end_token", "must not be empty"))?;

    Ok(EmbedSettings {
        name,
        url,
        start_token,
        end_token,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
        "cache.capacity",
    )?;
    let operation_timeout = positive_millis(
        cache.operation_timeout_ms,
        DEFAULT_CACHE_OPERATION_TIMEOUT_MS,
        "cache.operation_timeout_ms",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        page_ttl: Duration::from_secs(cache.page_ttl_seconds.unwrap_or(DEFAULT_PAGE_TTL_SECS)),
        operation_timeout,
    })
}

fn build_snippet_settings(snippets: RawSnippetSettings) -> Result<SnippetSettings, LoadError> {
    let request_timeout = positive_millis(
        snippets.request_timeout_ms,
        DEFAULT_SNIPPET_REQUEST_TIMEOUT_MS,
        "snippets.request_timeout_ms",
    )?;
    let max_body_bytes = non_zero_usize(
        snippets
            .max_body_bytes
            .unwrap_or(DEFAULT_SNIPPET_MAX_BODY_BYTES),
        "snippets.max_body_bytes",
    )?;

    Ok(SnippetSettings {
        ttl: Duration::from_secs(snippets.ttl_seconds.unwrap_or(DEFAULT_SNIPPET_TTL_SECS)),
        request_timeout,
        max_body_bytes,
        user_agent: non_blank(snippets.user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
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
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    query_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    subtitle: Option<String>,
    description: Option<String>,
    theme: Option<String>,
    subdirectory: Option<String>,
    version: Option<String>,
    more_tag: Option<String>,
    entries_per_page: Option<usize>,
    admin_entries_per_page: Option<usize>,
    cache_control_header: Option<String>,
    default_author: Option<String>,
    disqus_id: Option<String>,
    analytics_id: Option<String>,
    analytics_domain: Option<String>,
    countdown: Option<String>,
    embeds: Vec<RawEmbedSettings>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEmbedSettings {
    name: Option<String>,
    url: Option<String>,
    start_token: Option<String>,
    end_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    page_ttl_seconds: Option<u64>,
    operation_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSnippetSettings {
    ttl_seconds: Option<u64>,
    request_timeout_ms: Option<u64>,
    max_body_bytes: Option<usize>,
    user_agent: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_millis(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        millis => Ok(Duration::from_millis(millis)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// `"blog/"`, `"/blog"` and `"/blog/"` all become `"/blog"`; blank becomes `""`.
fn normalize_subdirectory(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
