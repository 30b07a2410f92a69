use std::path::PathBuf;

use tracing::{instrument, warn};

use crate::{
    analysis::AnalysisResult,
    common::remote::{TEAM_A_IMAGE, TEAM_B_IMAGE},
    config::Configuration,
    error::DownloadError,
    relay::{RelayedImage, fetcher::DEFAULT_CONTENT_TYPE, relay_url},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormationCard {
    pub team_a: Option<String>,
    pub team_b: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePanel {
    pub title: &'static str,
    pub caption: &'static str,
    /// Original location on the remote host, used for downloads only.
    pub remote_url: String,
    /// Same-origin relay address the image is displayed from.
    pub relay_src: String,
    pub placeholder: String,
    pub download_name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub formations: Option<FormationCard>,
    pub detection: ImagePanel,
    pub formation: ImagePanel,
}

impl ResultsView {
    pub fn panels(&self) -> [&ImagePanel; 2] {
        [&self.detection, &self.formation]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelImage {
    Loaded(RelayedImage),
    Placeholder(String),
}

/// Turns an [`AnalysisResult`] into what the results page shows.
#[derive(Debug, Clone)]
pub struct ResultsPresenter {
    pub(crate) http: reqwest::Client,
    relay_base: String,
    placeholder_detection: String,
    placeholder_formation: String,
    pub(crate) download_dir: PathBuf,
}

impl ResultsPresenter {
    pub fn new(http: reqwest::Client, relay_base: impl Into<String>) -> Self {
        let defaults = Configuration::default();
        Self {
            http,
            relay_base: relay_base.into(),
            placeholder_detection: defaults.placeholder_detection,
            placeholder_formation: defaults.placeholder_formation,
            download_dir: defaults.download_dir,
        }
    }

    pub fn from_configuration(
        configuration: &Configuration,
        relay_base: impl Into<String>,
    ) -> Result<Self, DownloadError> {
        let http = reqwest::Client::builder()
            .timeout(configuration.request_timeout())
            .build()?;
        Ok(Self {
            http,
            relay_base: relay_base.into(),
            placeholder_detection: configuration.placeholder_detection.clone(),
            placeholder_formation: configuration.placeholder_formation.clone(),
            download_dir: configuration.download_dir.clone(),
        })
    }

    pub fn with_download_dir(mut self, download_dir: impl Into<PathBuf>) -> Self {
        self.download_dir = download_dir.into();
        self
    }

    pub fn present(&self, result: &AnalysisResult) -> ResultsView {
        let formations = result.formations().map(|f| FormationCard {
            team_a: f.team1.clone(),
            team_b: f.team2.clone(),
        });
        ResultsView {
            formations,
            detection: ImagePanel {
                title: "Team A Analysis",
                caption: "Bounding boxes, center points, and formation lines",
                remote_url: result.detection_image_url().to_string(),
                relay_src: relay_url(&self.relay_base, result.detection_image_url()),
                placeholder: self.placeholder_detection.clone(),
                download_name: TEAM_A_IMAGE,
            },
            formation: ImagePanel {
                title: "Team B Analysis",
                caption: "Bounding boxes, center points, and formation lines",
                remote_url: result.formation_image_url().to_string(),
                relay_src: relay_url(&self.relay_base, result.formation_image_url()),
                placeholder: self.placeholder_formation.clone(),
                download_name: TEAM_B_IMAGE,
            },
        }
    }

    /// Loads both panels concurrently; each one falls back on its own.
    pub async fn load_panels(&self, view: &ResultsView) -> (PanelImage, PanelImage) {
        futures::join!(
            self.load_panel_image(&view.detection),
            self.load_panel_image(&view.formation)
        )
    }

    /// Loads a panel through the relay. Any failure yields the placeholder.
    #[instrument(skip(self, panel), fields(panel = panel.title))]
    pub async fn load_panel_image(&self, panel: &ImagePanel) -> PanelImage {
        let response = match self.http.get(&panel.relay_src).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("Failed to load {}: relay answered {}", panel.title, response.status());
                return PanelImage::Placeholder(panel.placeholder.clone());
            }
            Err(e) => {
                warn!("Failed to load {}: {}", panel.title, e);
                return PanelImage::Placeholder(panel.placeholder.clone());
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        match response.bytes().await {
            Ok(bytes) => PanelImage::Loaded(RelayedImage {
                bytes,
                content_type,
            }),
            Err(e) => {
                warn!("Failed to read {}: {}", panel.title, e);
                PanelImage::Placeholder(panel.placeholder.clone())
            }
        }
    }
}
