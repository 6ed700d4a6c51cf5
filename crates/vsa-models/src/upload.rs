//! Upload file name and size rules shared by the server and the client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Files smaller than this are treated as placeholders or metadata, not video.
pub const MIN_UPLOAD_BYTES: u64 = 1000;

/// Accepted video container extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoExtension {
    Mp4,
    Mov,
    Avi,
}

impl VideoExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoExtension::Mp4 => "mp4",
            VideoExtension::Mov => "mov",
            VideoExtension::Avi => "avi",
        }
    }

    /// Default MIME type when the caller did not provide one.
    pub fn content_type(&self) -> &'static str {
        match self {
            VideoExtension::Mp4 => "video/mp4",
            VideoExtension::Mov => "video/quicktime",
            VideoExtension::Avi => "video/x-msvideo",
        }
    }
}

impl fmt::Display for VideoExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoExtension {
    type Err = UploadValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(VideoExtension::Mp4),
            "mov" => Ok(VideoExtension::Mov),
            "avi" => Ok(VideoExtension::Avi),
            _ => Err(UploadValidationError::UnsupportedExtension(s.to_string())),
        }
    }
}

/// Reasons an upload is rejected before touching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadValidationError {
    #[error("File name is required")]
    MissingFileName,

    #[error("Invalid file type: .{0} is not a supported video format (mp4, mov, avi)")]
    UnsupportedExtension(String),

    #[error("Invalid file - select the real video file")]
    MetadataFile,

    #[error("File too small ({0} bytes) - select a valid video")]
    TooSmall(u64),
}

/// Validate an upload file name.
///
/// Returns the parsed extension and the extension exactly as written in the
/// name, which is what the storage key keeps.
pub fn validate_video_file_name(
    name: &str,
) -> Result<(VideoExtension, &str), UploadValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UploadValidationError::MissingFileName);
    }

    // AppleDouble companions (`._clip.mp4`) carry the right extension but no video.
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.starts_with("._") {
        return Err(UploadValidationError::MetadataFile);
    }

    let raw = match base.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return Err(UploadValidationError::UnsupportedExtension(String::new())),
    };

    let ext = raw.parse::<VideoExtension>()?;
    Ok((ext, raw))
}

/// Validate the size of a file streamed through the service.
pub fn validate_upload_size(len: u64) -> Result<(), UploadValidationError> {
    if len < MIN_UPLOAD_BYTES {
        return Err(UploadValidationError::TooSmall(len));
    }
    Ok(())
}
