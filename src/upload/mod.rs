pub mod file;

pub use file::{ImageUpload, UploadFile, select_single};
