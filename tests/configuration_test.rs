use pixel_relay::app::{Config, ConfigError, LogFormat, LogLevel};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const ENV_KEYS: &[&str] = &[
    "PIXEL_ENDPOINT",
    "PIXEL_DEBUG",
    "BATCH_INTERVAL_MS",
    "HEARTBEAT_INTERVAL_MS",
    "GEO_ENDPOINT",
    "DISABLE_GEO",
    "GEO_TIMEOUT_MS",
    "SEND_TIMEOUT_SECS",
    "TERMINATION_BUDGET_MS",
    "ENABLE_COMPRESSION",
    "QUEUE_WARN_THRESHOLD",
    "PAGE_URL",
    "PAGE_REFERRER",
    "PAGE_TITLE",
    "PAGE_VIEWPORT",
    "USER_AGENT",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "CONFIG_FILE",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
#[serial]
fn defaults_match_documented_intervals() {
    clear_env();
    let config = Config::from_args(["pixel-relay"]).unwrap();

    assert_eq!(config.batch_interval, Duration::from_secs(5));
    assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(config.geo_timeout, Duration::from_secs(5));
    assert_eq!(config.send_timeout, Duration::from_secs(30));
    assert_eq!(config.termination_budget, Duration::from_secs(4));
    assert!(!config.debug);
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.log_format, LogFormat::Compact);
}

#[test]
#[serial]
fn command_line_flags_override_defaults() {
    clear_env();
    let config = Config::from_args([
        "pixel-relay",
        "--endpoint",
        "https://collector.example/track",
        "--batch-interval-ms",
        "1000",
        "--heartbeat-interval-ms",
        "10000",
        "--debug",
        "--disable-geo",
        "--viewport",
        "1920x1080",
        "--page-url",
        "https://shop.example/",
        "--log-format",
        "json",
    ])
    .unwrap();

    assert_eq!(config.endpoint, "https://collector.example/track");
    assert!(config.debug);
    assert_eq!(config.log_format, LogFormat::Json);

    let settings = config.relay_settings();
    assert_eq!(settings.batch_interval, Duration::from_secs(1));
    assert_eq!(settings.heartbeat_interval, Duration::from_secs(10));
    assert!(settings.debug);

    let page = config.page_context();
    assert_eq!(page.url(), "https://shop.example/");
    assert_eq!(page.viewport().as_deref(), Some("1920x1080"));
}

#[test]
#[serial]
fn environment_is_read_when_flags_are_absent() {
    clear_env();
    unsafe {
        std::env::set_var("PIXEL_ENDPOINT", "https://env.example/collect");
        std::env::set_var("BATCH_INTERVAL_MS", "2500");
        std::env::set_var("SEND_TIMEOUT_SECS", "10");
        std::env::set_var("QUEUE_WARN_THRESHOLD", "1000");
        std::env::set_var("LOG_LEVEL", "debug");
    }

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.endpoint, "https://env.example/collect");
    assert_eq!(config.batch_interval, Duration::from_millis(2500));
    assert_eq!(config.client_config().timeout, Duration::from_secs(10));
    assert_eq!(config.queue_warn_threshold, Some(1000));
    assert_eq!(config.log_level, LogLevel::Debug);
}

#[test]
#[serial]
fn malformed_environment_value_is_reported() {
    clear_env();
    unsafe { std::env::set_var("HEARTBEAT_INTERVAL_MS", "soon") };

    let result = Config::from_env();
    clear_env();

    assert!(matches!(result, Err(ConfigError::EnvError(_))));
}

#[test]
#[serial]
fn toml_file_fills_unspecified_fields_with_defaults() {
    clear_env();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
endpoint = "https://file.example/track"
heartbeat_interval_ms = 15000
disable_geo = true
page_title = "Checkout"
log_level = "warn"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.endpoint, "https://file.example/track");
    assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
    assert_eq!(config.batch_interval, Duration::from_secs(5));
    assert!(config.disable_geo);
    assert_eq!(config.page_context().title(), Some("Checkout"));
    assert_eq!(config.log_level, LogLevel::Warn);
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    clear_env();

    assert!(matches!(
        Config::from_args(["pixel-relay", "--endpoint", "not a url"]),
        Err(ConfigError::InvalidUrl(_))
    ));
    assert!(matches!(
        Config::from_args(["pixel-relay", "--batch-interval-ms", "0"]),
        Err(ConfigError::InvalidConfig(_))
    ));
    assert!(matches!(
        Config::from_args(["pixel-relay", "--viewport", "wide"]),
        Err(ConfigError::InvalidConfig(_))
    ));
    assert!(matches!(
        Config::from_file("/nonexistent/pixel-relay.toml"),
        Err(ConfigError::FileError(_))
    ));
}

#[test]
#[serial]
fn disabled_geo_skips_geo_endpoint_validation() {
    clear_env();
    let config =
        Config::from_args(["pixel-relay", "--disable-geo", "--geo-endpoint", "::"]).unwrap();
    assert!(config.disable_geo);
}
