use thiserror::Error;

// Main application error type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Analysis Error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Relay Error: {0}")]
    Relay(#[from] RelayError),
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Controller Error: {0}")]
    Controller(#[from] ControllerError),
    #[error("Download Error: {0}")]
    Download(#[from] DownloadError),
    #[error("Failed to bind to {1}: {0}")]
    Bind(std::io::Error, String),
    #[error("Server stopped unexpectedly: {0}")]
    Serve(std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Failures of a single submission to the remote analysis service
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Upload failed with status {status}: {body}")]
    Submission { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),
    #[error("Analysis cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Missing url parameter")]
    BadRequest,
    #[error("Failed to fetch image: {status}")]
    Upstream { status: u16 },
    #[error("Failed to fetch image: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file selected")]
    NoFile,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File is not a readable image: {0}")]
    Unreadable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Cannot {command} while {state}")]
    InvalidTransition {
        command: &'static str,
        state: &'static str,
    },
    #[error("Controller task is no longer running")]
    ControllerClosed,
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Download failed with status {0}")]
    Status(u16),
    #[error("Failed to write {1}: {0}")]
    Write(std::io::Error, String),
}
