pub mod analysis;
pub mod common;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod presenter;
pub mod relay;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AnalysisError, AppError, ControllerError, RelayError, ValidationError};

pub use analysis::{AnalysisClient, AnalysisResult, Formations};
pub use controller::{UploadControllerHandle, UploadState};
pub use coordinator::{Coordinator, CoordinatorBuilder};
