use super::{Config, ConfigError};
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })?;

        if !self.disable_geo {
            Url::parse(&self.geo_endpoint).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Invalid geo endpoint URL '{}': {}",
                    self.geo_endpoint, e
                ))
            })?;
        }

        if self.batch_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch interval must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Heartbeat interval must be greater than 0".to_string(),
            ));
        }

        if self.geo_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Geo lookup timeout must be greater than 0".to_string(),
            ));
        }

        if self.send_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Send timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(viewport) = &self.viewport
            && parse_viewport(viewport).is_none()
        {
            return Err(ConfigError::InvalidConfig(format!(
                "Viewport must look like WIDTHxHEIGHT, got '{viewport}'"
            )));
        }

        Ok(())
    }
}

/// Parses `1280x720`.
pub(crate) fn parse_viewport(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("1280x720"), Some((1280, 720)));
        assert_eq!(parse_viewport("1280"), None);
        assert_eq!(parse_viewport("ax720"), None);
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let config = Config {
            heartbeat_interval_ms: 0,
            ..Config::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }
}
