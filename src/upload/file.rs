use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use image::ImageFormat;

use crate::error::ValidationError;

pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// A file as handed over by a drop or a file picker, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    name: String,
    bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Checks the extension against the raster allow-list, then sniffs the
    /// content so a renamed non-image is turned away as well.
    pub fn accept(self) -> Result<ImageUpload, ValidationError> {
        let extension = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| ValidationError::UnsupportedType(self.name.clone()))?;
        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::UnsupportedType(self.name));
        }

        let format = image::guess_format(&self.bytes)
            .map_err(|_| ValidationError::Unreadable(self.name.clone()))?;
        match format {
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP => Ok(ImageUpload {
                mime: format.to_mime_type(),
                file: self,
            }),
            _ => Err(ValidationError::UnsupportedType(self.name)),
        }
    }
}

/// Takes the first file of a drop or selection; the rest are ignored.
pub fn select_single(files: Vec<UploadFile>) -> Result<ImageUpload, ValidationError> {
    files
        .into_iter()
        .next()
        .ok_or(ValidationError::NoFile)?
        .accept()
}

/// An upload that passed the image filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file: UploadFile,
    mime: &'static str,
}

impl ImageUpload {
    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn bytes(&self) -> Bytes {
        self.file.bytes.clone()
    }

    /// In-memory `data:` URL of the file, used as the local preview.
    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.file.bytes))
    }
}
