//! Image payload inspection before upload.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

/// Default upload limit (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image formats recognised by magic number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Webp,
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension used in the object key.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Content type sent with the upload.
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Webp => "image/webp",
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Detect the format from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];

        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else if bytes.starts_with(PNG) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(JPEG) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

/// Why an image payload was refused before upload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image is empty")]
    Empty,
    #[error("image is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("image format not recognised")]
    Unrecognized,
    #[error("image format {0:?} is not accepted")]
    NotAccepted(ImageFormat),
}

impl From<ImageError> for ErrorKind {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::TooLarge { .. } => ErrorKind::TooLarge,
            ImageError::Empty | ImageError::Unrecognized | ImageError::NotAccepted(_) => {
                ErrorKind::UnsupportedType
            }
        }
    }
}

/// Limits applied to every upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePolicy {
    pub max_bytes: usize,
    pub accepted: Vec<ImageFormat>,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            accepted: vec![ImageFormat::Webp],
        }
    }
}

impl ImagePolicy {
    /// Check size and format, returning the detected format.
    pub fn inspect(&self, bytes: &[u8]) -> Result<ImageFormat, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }
        let format = ImageFormat::sniff(bytes).ok_or(ImageError::Unrecognized)?;
        if !self.accepted.contains(&format) {
            return Err(ImageError::NotAccepted(format));
        }
        Ok(format)
    }
}

/// Object key for a product image: `{id}.{ext}`.
pub fn object_key(id: &str, format: ImageFormat) -> String {
    format!("{}.{}", id, format.extension())
}

#[cfg(test)]
pub(crate) fn webp_bytes(payload_len: usize) -> Vec<u8> {
    let mut v = b"RIFF\0\0\0\0WEBPVP8 ".to_vec();
    v.resize(v.len() + payload_len, 0);
    v
}
