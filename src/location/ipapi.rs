use super::resolver::{GeoLookup, LookupError};
use crate::domain::LocationInfo;
use crate::domain::location::{HIDDEN_IP, UNKNOWN, mask_ip};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct IpApiConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for IpApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ipapi.co/json/".to_string(),
            timeout: Duration::from_secs(5),
            user_agent: format!("pixel-relay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    country_name: Option<String>,
    city: Option<String>,
    region: Option<String>,
    ip: Option<String>,
}

impl IpApiResponse {
    fn into_location(self) -> LocationInfo {
        LocationInfo {
            country: or_unknown(self.country_name),
            city: or_unknown(self.city),
            region: or_unknown(self.region),
            ip: Some(
                self.ip
                    .filter(|ip| !ip.is_empty())
                    .map(|ip| mask_ip(&ip))
                    .unwrap_or_else(|| HIDDEN_IP.to_string()),
            ),
        }
    }
}

fn or_unknown(field: Option<String>) -> String {
    field
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// ipapi.co-compatible JSON geolocation lookup.
#[derive(Debug, Clone)]
pub struct IpApiLookup {
    client: Client,
    endpoint: Url,
}

impl IpApiLookup {
    pub fn new(config: IpApiConfig) -> Result<Self, LookupError> {
        let endpoint: Url = config.endpoint.parse().map_err(|e| {
            LookupError::InvalidConfiguration(format!("Invalid geo endpoint URL: {e}"))
        })?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                LookupError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, endpoint })
    }

    async fn fetch(&self) -> Result<LocationInfo, LookupError> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::HttpError {
                status: status.as_u16(),
            });
        }

        let body: IpApiResponse = response.json().await?;
        debug!(endpoint = %self.endpoint, "Geo lookup succeeded");
        Ok(body.into_location())
    }
}

impl GeoLookup for IpApiLookup {
    fn lookup(&self) -> BoxFuture<'_, Result<LocationInfo, LookupError>> {
        self.fetch().boxed()
    }
}
