use crate::{analysis::AnalysisResult, upload::ImageUpload};

pub const GENERIC_FAILURE: &str = "Analysis failed";

/// The single active state of the upload workflow.
///
/// The chosen file and its preview travel with `Analyzing` and `Failed` so a
/// failed attempt can be retried or discarded without selecting again.
/// `Analyzing` never carries a result: entering it drops the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Previewing {
        upload: ImageUpload,
        preview: String,
    },
    Analyzing {
        upload: ImageUpload,
        preview: String,
    },
    Complete(AnalysisResult),
    Failed {
        upload: ImageUpload,
        preview: String,
        message: String,
    },
}

impl UploadState {
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Previewing { .. } => "previewing",
            UploadState::Analyzing { .. } => "analyzing",
            UploadState::Complete(_) => "complete",
            UploadState::Failed { .. } => "failed",
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            UploadState::Complete(result) => Some(result),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&str> {
        match self {
            UploadState::Previewing { preview, .. }
            | UploadState::Analyzing { preview, .. }
            | UploadState::Failed { preview, .. } => Some(preview),
            _ => None,
        }
    }

    pub fn upload(&self) -> Option<&ImageUpload> {
        match self {
            UploadState::Previewing { upload, .. }
            | UploadState::Analyzing { upload, .. }
            | UploadState::Failed { upload, .. } => Some(upload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            UploadState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, UploadState::Analyzing { .. })
    }
}

/// Message shown for a failed attempt.
pub fn failure_message(error: &impl std::fmt::Display) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        message
    }
}
