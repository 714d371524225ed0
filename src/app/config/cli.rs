use super::serde_helpers::{
    load_env_path_opt, load_env_string, load_env_string_opt, load_env_var, load_env_var_opt,
};
use super::validation::parse_viewport;
use super::{ConfigError, LogFormat, LogLevel};
use crate::client::{RelaySettings, default_user_agent};
use crate::domain::PageContext;
use crate::location::IpApiConfig;
use crate::sender::ClientConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Collector endpoint receiving `{"batch": [...]}` payloads
    #[arg(long, env = "PIXEL_ENDPOINT", default_value = "http://localhost:8080/track")]
    pub endpoint: String,

    /// Diagnostic mode: log batches locally instead of sending them
    #[arg(long, env = "PIXEL_DEBUG")]
    pub debug: bool,

    /// Flush interval in milliseconds
    #[arg(long, env = "BATCH_INTERVAL_MS", default_value = "5000")]
    pub batch_interval_ms: u64,

    /// Heartbeat interval in milliseconds
    #[arg(long, env = "HEARTBEAT_INTERVAL_MS", default_value = "30000")]
    pub heartbeat_interval_ms: u64,

    /// Geolocation lookup endpoint
    #[arg(long, env = "GEO_ENDPOINT", default_value = "https://ipapi.co/json/")]
    pub geo_endpoint: String,

    /// Skip the geolocation lookup entirely (location is always Unknown)
    #[arg(long, env = "DISABLE_GEO")]
    pub disable_geo: bool,

    /// Geolocation lookup budget in milliseconds
    #[arg(long, env = "GEO_TIMEOUT_MS", default_value = "5000")]
    pub geo_timeout_ms: u64,

    /// Per-batch send timeout in seconds
    #[arg(long, env = "SEND_TIMEOUT_SECS", default_value = "30")]
    pub send_timeout_secs: u64,

    /// Time allowed for final deliveries on termination, in milliseconds
    #[arg(long, env = "TERMINATION_BUDGET_MS", default_value = "4000")]
    pub termination_budget_ms: u64,

    /// Gzip batches larger than 100 events
    #[arg(long, env = "ENABLE_COMPRESSION")]
    pub enable_compression: bool,

    /// Warn when this many events are waiting for delivery
    #[arg(long, env = "QUEUE_WARN_THRESHOLD")]
    pub queue_warn_threshold: Option<usize>,

    /// URL of the observed page
    #[arg(long, env = "PAGE_URL", default_value = "")]
    pub page_url: String,

    /// Referrer of the observed page
    #[arg(long, env = "PAGE_REFERRER", default_value = "")]
    pub page_referrer: String,

    /// Title of the observed page
    #[arg(long, env = "PAGE_TITLE")]
    pub page_title: Option<String>,

    /// Viewport as WIDTHxHEIGHT
    #[arg(long, env = "PAGE_VIEWPORT")]
    pub viewport: Option<String>,

    /// Client context string attached to every event
    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub batch_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub heartbeat_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub geo_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub send_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub termination_budget: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/track".to_string(),
            debug: false,
            batch_interval_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            geo_endpoint: "https://ipapi.co/json/".to_string(),
            disable_geo: false,
            geo_timeout_ms: 5_000,
            send_timeout_secs: 30,
            termination_budget_ms: 4_000,
            enable_compression: false,
            queue_warn_threshold: None,
            page_url: String::new(),
            page_referrer: String::new(),
            page_title: None,
            viewport: None,
            user_agent: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Compact,
            config_file: None,
            batch_interval: Duration::from_millis(5_000),
            heartbeat_interval: Duration::from_millis(30_000),
            geo_timeout: Duration::from_millis(5_000),
            send_timeout: Duration::from_secs(30),
            termination_budget: Duration::from_millis(4_000),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::try_parse_from(args)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        load_env_string("PIXEL_ENDPOINT", &mut config.endpoint);
        load_env_var("PIXEL_DEBUG", &mut config.debug)?;
        load_env_var("BATCH_INTERVAL_MS", &mut config.batch_interval_ms)?;
        load_env_var("HEARTBEAT_INTERVAL_MS", &mut config.heartbeat_interval_ms)?;
        load_env_string("GEO_ENDPOINT", &mut config.geo_endpoint);
        load_env_var("DISABLE_GEO", &mut config.disable_geo)?;
        load_env_var("GEO_TIMEOUT_MS", &mut config.geo_timeout_ms)?;
        load_env_var("SEND_TIMEOUT_SECS", &mut config.send_timeout_secs)?;
        load_env_var("TERMINATION_BUDGET_MS", &mut config.termination_budget_ms)?;
        load_env_var("ENABLE_COMPRESSION", &mut config.enable_compression)?;
        load_env_var_opt("QUEUE_WARN_THRESHOLD", &mut config.queue_warn_threshold)?;
        load_env_string("PAGE_URL", &mut config.page_url);
        load_env_string("PAGE_REFERRER", &mut config.page_referrer);
        load_env_string_opt("PAGE_TITLE", &mut config.page_title);
        load_env_string_opt("PAGE_VIEWPORT", &mut config.viewport);
        load_env_string_opt("USER_AGENT", &mut config.user_agent);
        load_env_var("LOG_LEVEL", &mut config.log_level)?;
        load_env_var("LOG_FORMAT", &mut config.log_format)?;
        load_env_path_opt("CONFIG_FILE", &mut config.config_file);

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.batch_interval = Duration::from_millis(self.batch_interval_ms);
        self.heartbeat_interval = Duration::from_millis(self.heartbeat_interval_ms);
        self.geo_timeout = Duration::from_millis(self.geo_timeout_ms);
        self.send_timeout = Duration::from_secs(self.send_timeout_secs);
        self.termination_budget = Duration::from_millis(self.termination_budget_ms);
        Ok(())
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            batch_interval: self.batch_interval,
            heartbeat_interval: self.heartbeat_interval,
            geo_timeout: self.geo_timeout,
            termination_budget: self.termination_budget,
            debug: self.debug,
            queue_warn_threshold: self.queue_warn_threshold,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            timeout: self.send_timeout,
            enable_compression: self.enable_compression,
            user_agent: format!("pixel-relay/{}", env!("CARGO_PKG_VERSION")),
            ..ClientConfig::default()
        }
    }

    pub fn geo_config(&self) -> IpApiConfig {
        IpApiConfig {
            endpoint: self.geo_endpoint.clone(),
            timeout: self.geo_timeout,
            ..IpApiConfig::default()
        }
    }

    pub fn page_context(&self) -> PageContext {
        let user_agent = self.user_agent.clone().unwrap_or_else(default_user_agent);
        let mut page = PageContext::new(&self.page_url, &self.page_referrer, user_agent);
        if let Some(title) = &self.page_title {
            page = page.with_title(title);
        }
        if let Some((width, height)) = self.viewport.as_deref().and_then(parse_viewport) {
            page = page.with_viewport(width, height);
        }
        page
    }
}
