use std::net::{Ipv4Addr, SocketAddr};

use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    analysis::{AnalysisClient, AnalysisService},
    config::{Configuration, ReadinessMode},
    controller::{UploadController, UploadControllerHandle},
    error::AppError,
    presenter::ResultsPresenter,
    relay::{ImageRelay, router},
};

/// Runs the image relay server and the upload controller side by side.
pub struct Coordinator {
    server_task: JoinHandle<Result<(), AppError>>,
    controller_task: JoinHandle<()>,
    controller: UploadControllerHandle,
    presenter: ResultsPresenter,
    local_addr: SocketAddr,
    cancel_token: CancellationToken,
}

impl Coordinator {
    async fn start(configuration: Configuration) -> Result<Self, AppError> {
        configuration.validate()?;
        let cancel_token = CancellationToken::new();

        let relay = ImageRelay::from_configuration(&configuration)?;
        let listener = TcpListener::bind(&configuration.bind_address)
            .await
            .map_err(|e| AppError::Bind(e, configuration.bind_address.clone()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Bind(e, configuration.bind_address.clone()))?;
        let server_task = Self::start_server_task(listener, relay, cancel_token.clone());
        info!("Image relay listening on http://{}", local_addr);

        let client = AnalysisClient::from_configuration(&configuration)?;
        info!(
            "Analysis service at {}",
            client.endpoint().process_image_url()
        );
        let (controller_task, controller) =
            UploadController::spawn(AnalysisService::new(client));

        let presenter =
            ResultsPresenter::from_configuration(&configuration, Self::relay_base(local_addr))?;

        Ok(Self {
            server_task,
            controller_task,
            controller,
            presenter,
            local_addr,
            cancel_token,
        })
    }

    fn start_server_task(
        listener: TcpListener,
        relay: ImageRelay,
        cancel_token: CancellationToken,
    ) -> JoinHandle<Result<(), AppError>> {
        tokio::spawn(async move {
            axum::serve(listener, router(relay))
                .with_graceful_shutdown(async move { cancel_token.cancelled().await })
                .await
                .map_err(AppError::Serve)
        })
    }

    // A wildcard bind is reached through loopback.
    fn relay_base(local_addr: SocketAddr) -> String {
        if local_addr.ip().is_unspecified() {
            format!("http://{}:{}", Ipv4Addr::LOCALHOST, local_addr.port())
        } else {
            format!("http://{}", local_addr)
        }
    }

    pub fn controller(&self) -> &UploadControllerHandle {
        &self.controller
    }

    pub fn presenter(&self) -> &ResultsPresenter {
        &self.presenter
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves when the relay server stops.
    pub async fn wait(&mut self) -> Result<(), AppError> {
        (&mut self.server_task)
            .await
            .map_err(|e| AppError::Serve(std::io::Error::other(e.to_string())))?
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
        self.controller_task.abort();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self { configuration }
    }

    // Sets the analysis service base URL, this will override the configuration.
    pub fn remote_base_url(mut self, remote_base_url: impl Into<String>) -> Self {
        self.configuration.remote_base_url = remote_base_url.into();
        self
    }

    // Sets the relay listen address, this will override the configuration.
    pub fn bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.configuration.bind_address = bind_address.into();
        self
    }

    // Uses a fixed settle delay, this will override the configuration.
    pub fn settle_delay_ms(mut self, settle_delay_ms: u64) -> Self {
        self.configuration.readiness = ReadinessMode::Fixed;
        self.configuration.settle_delay_ms = settle_delay_ms;
        self
    }

    // Polls for result images instead of waiting a fixed delay.
    pub fn poll_readiness(mut self, poll_interval_ms: u64, poll_attempts: u32) -> Self {
        self.configuration.readiness = ReadinessMode::Poll;
        self.configuration.poll_interval_ms = poll_interval_ms;
        self.configuration.poll_attempts = poll_attempts;
        self
    }

    pub async fn build(self) -> Result<Coordinator, AppError> {
        Coordinator::start(self.configuration).await
    }
}
