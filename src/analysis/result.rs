use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formations {
    #[serde(default)]
    pub team1: Option<String>,
    #[serde(default)]
    pub team2: Option<String>,
}

impl Formations {
    pub fn is_empty(&self) -> bool {
        self.team1.is_none() && self.team2.is_none()
    }
}

/// Body of a successful `process_image` call. Older service builds report the
/// labels as flat fields instead of the nested object.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProcessImageResponse {
    #[serde(default)]
    formations: Option<Formations>,
    #[serde(default, rename = "teamA_formation")]
    team_a_formation: Option<String>,
    #[serde(default, rename = "teamB_formation")]
    team_b_formation: Option<String>,
}

impl ProcessImageResponse {
    pub(crate) fn into_formations(self) -> Option<Formations> {
        let formations = self.formations.unwrap_or(Formations {
            team1: self.team_a_formation,
            team2: self.team_b_formation,
        });
        (!formations.is_empty()).then_some(formations)
    }
}

/// Outcome of one successful analysis. Both image URLs point at the remote
/// host; relay URLs are derived when rendering and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    detection_image_url: String,
    formation_image_url: String,
    formations: Option<Formations>,
}

impl AnalysisResult {
    pub fn new(
        detection_image_url: String,
        formation_image_url: String,
        formations: Option<Formations>,
    ) -> Self {
        Self {
            detection_image_url,
            formation_image_url,
            formations,
        }
    }

    pub fn detection_image_url(&self) -> &str {
        &self.detection_image_url
    }

    pub fn formation_image_url(&self) -> &str {
        &self.formation_image_url
    }

    pub fn formations(&self) -> Option<&Formations> {
        self.formations.as_ref()
    }
}
