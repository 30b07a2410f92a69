use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

use crate::{
    analysis::AnalysisResult,
    controller::state::{UploadState, failure_message},
    error::{AnalysisError, AppError, ControllerError},
    upload::{ImageUpload, UploadFile, select_single},
};

type Responder = oneshot::Sender<Result<(), AppError>>;

pub enum ControllerCommand {
    Select {
        files: Vec<UploadFile>,
        responder: Responder,
    },
    Discard {
        responder: Responder,
    },
    Analyze {
        responder: Responder,
    },
    Reset {
        responder: Responder,
    },
}

/// Outcome of one analysis attempt, tagged with the generation it started in.
pub struct Completion {
    generation: u64,
    outcome: Result<AnalysisResult, AnalysisError>,
}

#[derive(Clone)]
pub struct UploadControllerHandle {
    command_tx: mpsc::Sender<ControllerCommand>,
    state_rx: watch::Receiver<UploadState>,
}

impl UploadControllerHandle {
    async fn request(
        &self,
        command: impl FnOnce(Responder) -> ControllerCommand,
    ) -> Result<(), AppError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(command(responder))
            .await
            .map_err(|_| ControllerError::ControllerClosed)?;
        response_rx
            .await
            .map_err(|_| ControllerError::ControllerClosed)?
    }

    /// Offers a dropped or picked set of files. Only the first one is used.
    pub async fn select(&self, files: Vec<UploadFile>) -> Result<(), AppError> {
        self.request(|responder| ControllerCommand::Select { files, responder })
            .await
    }

    pub async fn discard(&self) -> Result<(), AppError> {
        self.request(|responder| ControllerCommand::Discard { responder })
            .await
    }

    pub async fn analyze(&self) -> Result<(), AppError> {
        self.request(|responder| ControllerCommand::Analyze { responder })
            .await
    }

    pub async fn reset(&self) -> Result<(), AppError> {
        self.request(|responder| ControllerCommand::Reset { responder })
            .await
    }

    pub fn state(&self) -> UploadState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state_rx.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&UploadState) -> bool,
    ) -> Result<UploadState, ControllerError> {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx
            .wait_for(predicate)
            .await
            .map_err(|_| ControllerError::ControllerClosed)?;
        Ok(state.clone())
    }
}

/// Owns the upload workflow state and drives the analysis service.
///
/// Every attempt runs in its own task with its own cancellation token.
/// `generation` moves forward on each analyze, discard and reset; a
/// completion carrying an older generation is dropped.
pub struct UploadController<S> {
    analyzer: S,
    state: UploadState,
    generation: u64,
    attempt: Option<CancellationToken>,
    state_tx: watch::Sender<UploadState>,
    command_rx: mpsc::Receiver<ControllerCommand>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
}

impl<S> UploadController<S>
where
    S: Service<ImageUpload, Response = AnalysisResult, Error = AnalysisError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    pub fn new(analyzer: S) -> (Self, UploadControllerHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (completion_tx, completion_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(UploadState::Idle);
        (
            Self {
                analyzer,
                state: UploadState::Idle,
                generation: 0,
                attempt: None,
                state_tx,
                command_rx,
                completion_tx,
                completion_rx,
            },
            UploadControllerHandle {
                command_tx,
                state_rx,
            },
        )
    }

    pub fn spawn(analyzer: S) -> (JoinHandle<()>, UploadControllerHandle) {
        let (controller, handle) = Self::new(analyzer);
        (tokio::spawn(controller.run()), handle)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All controller handles dropped, stopping");
                        break;
                    }
                },
                Some(completion) = self.completion_rx.recv() => self.finish(completion),
            }
        }
        self.cancel_attempt();
    }

    fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Select { files, responder } => {
                let _ = responder.send(self.select(files));
            }
            ControllerCommand::Discard { responder } => {
                let _ = responder.send(self.discard());
            }
            ControllerCommand::Analyze { responder } => {
                let _ = responder.send(self.analyze());
            }
            ControllerCommand::Reset { responder } => {
                self.reset();
                let _ = responder.send(Ok(()));
            }
        }
    }

    fn select(&mut self, files: Vec<UploadFile>) -> Result<(), AppError> {
        match self.state {
            UploadState::Idle | UploadState::Previewing { .. } | UploadState::Failed { .. } => {}
            _ => return Err(self.invalid("select a file").into()),
        }
        let upload = select_single(files)?;
        let preview = upload.preview_data_url();
        info!("Previewing {} ({})", upload.name(), upload.mime());
        self.transition(UploadState::Previewing { upload, preview });
        Ok(())
    }

    fn discard(&mut self) -> Result<(), AppError> {
        match self.state {
            UploadState::Idle => Ok(()),
            UploadState::Previewing { .. } | UploadState::Failed { .. } => {
                self.generation += 1;
                self.transition(UploadState::Idle);
                Ok(())
            }
            _ => Err(self.invalid("discard").into()),
        }
    }

    fn analyze(&mut self) -> Result<(), AppError> {
        let (upload, preview) = match &self.state {
            UploadState::Previewing { upload, preview }
            | UploadState::Failed {
                upload, preview, ..
            } => (upload.clone(), preview.clone()),
            _ => return Err(self.invalid("analyze").into()),
        };

        self.cancel_attempt();
        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.attempt = Some(token.clone());
        // Published before the request goes out, so no previous result survives.
        self.transition(UploadState::Analyzing {
            upload: upload.clone(),
            preview,
        });

        let analyzer = self.analyzer.clone();
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => Err(AnalysisError::Cancelled),
                outcome = analyzer.oneshot(upload) => outcome,
            };
            if completion_tx
                .send(Completion {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                debug!("Controller gone before attempt {} finished", generation);
            }
        });
        info!("Analysis attempt {} started", generation);
        Ok(())
    }

    fn reset(&mut self) {
        self.cancel_attempt();
        self.generation += 1;
        if self.state != UploadState::Idle {
            self.transition(UploadState::Idle);
        }
    }

    fn finish(&mut self, completion: Completion) {
        let (upload, preview) = match &self.state {
            UploadState::Analyzing { upload, preview }
                if completion.generation == self.generation =>
            {
                (upload.clone(), preview.clone())
            }
            _ => {
                debug!(
                    "Dropping stale completion from attempt {} (current {}, {})",
                    completion.generation,
                    self.generation,
                    self.state.name()
                );
                return;
            }
        };
        self.attempt = None;

        let next = match completion.outcome {
            Ok(result) => {
                info!("Analysis attempt {} complete", completion.generation);
                UploadState::Complete(result)
            }
            Err(e) => {
                warn!("Analysis attempt {} failed: {}", completion.generation, e);
                UploadState::Failed {
                    upload,
                    preview,
                    message: failure_message(&e),
                }
            }
        };
        self.transition(next);
    }

    fn transition(&mut self, next: UploadState) {
        debug!("Upload state {} -> {}", self.state.name(), next.name());
        self.state = next;
        self.state_tx.send_replace(self.state.clone());
    }

    fn cancel_attempt(&mut self) {
        if let Some(token) = self.attempt.take() {
            token.cancel();
        }
    }

    fn invalid(&self, command: &'static str) -> ControllerError {
        ControllerError::InvalidTransition {
            command,
            state: self.state.name(),
        }
    }
}
