use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, warn};

use crate::{common::bypass_tunnel_warning, config::Configuration, error::RelayError};

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
pub const RELAY_PATH: &str = "/api/proxy-image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Fetches remote images on behalf of the browser.
#[derive(Debug, Clone, Default)]
pub struct ImageRelay {
    http: reqwest::Client,
}

impl ImageRelay {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(configuration.request_timeout())
            .build()?;
        Ok(Self::new(http))
    }

    #[instrument(skip(self))]
    pub async fn relay(&self, source_url: Option<&str>) -> Result<RelayedImage, RelayError> {
        let source_url = source_url
            .filter(|url| !url.is_empty())
            .ok_or(RelayError::BadRequest)?;

        let response = bypass_tunnel_warning(self.http.get(source_url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Upstream answered {} for {}", status, source_url);
            return Err(RelayError::Upstream {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        debug!("Relayed {} bytes of {} from {}", bytes.len(), content_type, source_url);
        Ok(RelayedImage {
            bytes,
            content_type,
        })
    }
}

/// Same-origin address under which `source_url` is served by the relay.
/// `relay_base` is empty for a path relative to the current origin.
pub fn relay_url(relay_base: &str, source_url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(source_url.as_bytes()).collect();
    format!(
        "{}{}?url={}",
        relay_base.trim_end_matches('/'),
        RELAY_PATH,
        encoded
    )
}
