use std::path::PathBuf;

use tracing::{error, info, instrument};

use crate::{
    common::bypass_tunnel_warning,
    error::DownloadError,
    presenter::results::{ImagePanel, ResultsPresenter},
};

impl ResultsPresenter {
    /// Saves the panel's image under its fixed download name. Fetches the
    /// remote URL directly; the relay is not involved.
    #[instrument(skip(self, panel), fields(file = panel.download_name))]
    pub async fn download(&self, panel: &ImagePanel) -> Result<PathBuf, DownloadError> {
        let result = self.fetch_and_save(panel).await;
        match &result {
            Ok(path) => info!("Saved {}", path.display()),
            Err(e) => error!("Download failed: {}", e),
        }
        result
    }

    async fn fetch_and_save(&self, panel: &ImagePanel) -> Result<PathBuf, DownloadError> {
        let response = bypass_tunnel_warning(self.http.get(&panel.remote_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;

        let path = self.download_dir.join(panel.download_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| DownloadError::Write(e, path.display().to_string()))?;
        Ok(path)
    }
}
