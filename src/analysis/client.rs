use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use tower::Service;
use tracing::{info, instrument, warn};

use crate::{
    analysis::{
        result::{AnalysisResult, ProcessImageResponse},
        settle::SettleStrategy,
    },
    common::{
        RemoteEndpoint, bypass_tunnel_warning,
        remote::{TEAM_A_IMAGE, TEAM_B_IMAGE, UPLOAD_FIELD},
    },
    config::Configuration,
    error::AnalysisError,
    upload::ImageUpload,
};

/// Submits pitch photos to the remote analysis service.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    endpoint: RemoteEndpoint,
    settle: SettleStrategy,
}

impl AnalysisClient {
    pub fn new(http: reqwest::Client, endpoint: RemoteEndpoint, settle: SettleStrategy) -> Self {
        Self {
            http,
            endpoint,
            settle,
        }
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(configuration.request_timeout())
            .build()?;
        Ok(Self::new(
            http,
            RemoteEndpoint::new(configuration.remote_base_url.clone()),
            configuration.settle_strategy(),
        ))
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Posts `upload` to `process_image` and builds the result from the
    /// service's fixed output filenames.
    ///
    /// The service returns no identifier for the images it writes, so the
    /// URLs are derived from the endpoint and stamped with the current time to
    /// defeat caches. The settle strategy runs before the result is returned.
    #[instrument(skip(self, upload), fields(file = %upload.name()))]
    pub async fn submit(&self, upload: ImageUpload) -> Result<AnalysisResult, AnalysisError> {
        let part = Part::bytes(upload.bytes().to_vec())
            .file_name(upload.name().to_string())
            .mime_str(upload.mime())?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        info!("Submitting {} to {}", upload.name(), self.endpoint.process_image_url());
        let response = bypass_tunnel_warning(self.http.post(self.endpoint.process_image_url()))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            warn!("Analysis rejected with status {}: {}", status, body);
            return Err(AnalysisError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let formations = serde_json::from_slice::<ProcessImageResponse>(&body)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?
            .into_formations();
        info!("Analysis accepted, formations: {:?}", formations);

        let now = Utc::now();
        let detection_image_url = self.endpoint.result_image_url(TEAM_A_IMAGE, now);
        let formation_image_url = self.endpoint.result_image_url(TEAM_B_IMAGE, now);

        self.settle
            .settle(&self.http, &[detection_image_url.as_str(), formation_image_url.as_str()])
            .await;

        Ok(AnalysisResult::new(
            detection_image_url,
            formation_image_url,
            formations,
        ))
    }
}

/// `tower` front for [`AnalysisClient`], cheap to clone into spawned tasks.
#[derive(Debug, Clone)]
pub struct AnalysisService {
    client: Arc<AnalysisClient>,
}

impl AnalysisService {
    pub fn new(client: AnalysisClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Service<ImageUpload> for AnalysisService {
    type Response = AnalysisResult;
    type Error = AnalysisError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, upload: ImageUpload) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move { client.submit(upload).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::Formations,
        testing::FakeRemote,
        upload::file::tests::{png_bytes, pitch_upload},
    };
    use axum::http::StatusCode;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    fn client_for(remote: &FakeRemote, settle: SettleStrategy) -> AnalysisClient {
        AnalysisClient::new(
            reqwest::Client::new(),
            RemoteEndpoint::new(remote.base_url()),
            settle,
        )
    }

    fn no_wait() -> SettleStrategy {
        SettleStrategy::FixedDelay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_submit_parses_formations_and_derives_urls() {
        let remote = FakeRemote::builder()
            .process_response(
                StatusCode::OK,
                r#"{"formations":{"team1":"4-4-2","team2":"4-3-3"}}"#,
            )
            .start()
            .await;
        let client = client_for(&remote, no_wait());

        let result = client.submit(pitch_upload().accept().unwrap()).await.unwrap();

        assert_eq!(
            result.formations(),
            Some(&Formations {
                team1: Some("4-4-2".to_string()),
                team2: Some("4-3-3".to_string()),
            })
        );
        let detection = url::Url::parse(result.detection_image_url()).unwrap();
        let formation = url::Url::parse(result.formation_image_url()).unwrap();
        assert!(detection.path().ends_with("teamA_boxes_lines.jpg"));
        assert!(formation.path().ends_with("teamB_boxes_lines.jpg"));
        assert!(detection.query_pairs().any(|(k, v)| k == "t" && !v.is_empty()));
        assert!(formation.query().is_some());
        assert!(result.detection_image_url().starts_with(&remote.base_url()));
    }

    #[tokio::test]
    async fn test_submit_sends_file_field_with_tunnel_header() {
        let remote = FakeRemote::builder().start().await;
        let client = client_for(&remote, no_wait());

        client.submit(pitch_upload().accept().unwrap()).await.unwrap();

        let upload = remote.last_upload().expect("upload received");
        assert_eq!(upload.field, "file");
        assert_eq!(upload.file_name.as_deref(), Some("pitch.png"));
        assert_eq!(upload.bytes, png_bytes());
        assert_eq!(remote.process_requests(), 1);
        assert!(remote.all_requests_bypassed_tunnel_warning());
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_body() {
        let remote = FakeRemote::builder()
            .process_response(StatusCode::INTERNAL_SERVER_ERROR, "server error")
            .start()
            .await;
        let client = client_for(&remote, no_wait());

        let error = client
            .submit(pitch_upload().accept().unwrap())
            .await
            .unwrap_err();

        match &error {
            AnalysisError::Submission { status, body } => {
                assert_eq!(*status, 500);
                assert_eq!(body, "server error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_invalid_response() {
        let remote = FakeRemote::builder()
            .process_response(StatusCode::OK, "<html>tunnel warning</html>")
            .start()
            .await;
        let client = client_for(&remote, no_wait());

        let error = client
            .submit(pitch_upload().accept().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(error, AnalysisError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client = AnalysisClient::new(
            reqwest::Client::new(),
            RemoteEndpoint::new("http://127.0.0.1:1"),
            no_wait(),
        );
        let error = client
            .submit(pitch_upload().accept().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(error, AnalysisError::Network(_)));
    }

    #[tokio::test]
    async fn test_settle_delay_runs_before_returning() {
        let remote = FakeRemote::builder().start().await;
        let client = client_for(&remote, SettleStrategy::FixedDelay(Duration::from_millis(40)));

        let start = Instant::now();
        client.submit(pitch_upload().accept().unwrap()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_service_delegates_to_client() {
        let remote = FakeRemote::builder()
            .process_response(StatusCode::OK, r#"{"teamB_formation":"4-1-4-1"}"#)
            .start()
            .await;
        let service = AnalysisService::new(client_for(&remote, no_wait()));

        let result = service
            .oneshot(pitch_upload().accept().unwrap())
            .await
            .unwrap();
        assert_eq!(
            result.formations().and_then(|f| f.team2.as_deref()),
            Some("4-1-4-1")
        );
    }
}
