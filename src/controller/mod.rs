pub mod state;
pub mod upload_controller;

pub use state::UploadState;
pub use upload_controller::{UploadController, UploadControllerHandle};
