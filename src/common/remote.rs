use chrono::{DateTime, Utc};

/// Header the tunnel provider inspects before serving its interstitial page.
pub const TUNNEL_WARNING_HEADER: &str = "ngrok-skip-browser-warning";
pub const TUNNEL_WARNING_VALUE: &str = "true";

pub const PROCESS_IMAGE_PATH: &str = "process_image";
pub const UPLOAD_FIELD: &str = "file";
pub const TEAM_A_IMAGE: &str = "teamA_boxes_lines.jpg";
pub const TEAM_B_IMAGE: &str = "teamB_boxes_lines.jpg";

/// Address of the remote analysis service and its naming conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    base_url: String,
}

impl RemoteEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn process_image_url(&self) -> String {
        format!("{}/{}", self.base_url, PROCESS_IMAGE_PATH)
    }

    /// Static location the service publishes `filename` to, with a cache-busting
    /// `t` parameter set to `at` in epoch milliseconds.
    pub fn result_image_url(&self, filename: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}/image/{}?t={}",
            self.base_url,
            filename,
            at.timestamp_millis()
        )
    }
}

/// Attaches the tunnel interstitial bypass header. Every request to the remote
/// host goes through here.
pub fn bypass_tunnel_warning(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request.header(TUNNEL_WARNING_HEADER, TUNNEL_WARNING_VALUE)
}
