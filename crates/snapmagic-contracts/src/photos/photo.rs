use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl PhotoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an edit failed. Kept for diagnostics only; the registry status is
/// `Error` for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditFailureKind {
    Configuration,
    Read,
    Service,
    EmptyResult,
}

impl EditFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Read => "read",
            Self::Service => "service",
            Self::EmptyResult => "empty_result",
        }
    }
}

impl fmt::Display for EditFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-supplied file as it arrives: name, location and declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSource {
    pub name: String,
    pub path: PathBuf,
    pub mime_type: String,
}

impl PhotoSource {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Declares the media type from the file extension, the same way a file
    /// picker would.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = mime_for_path(&path)
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            name,
            path,
            mime_type,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.trim().to_ascii_lowercase().starts_with("image/")
    }
}

/// Decoded result of a successful edit. Owns its bytes so it can be rendered
/// or saved without going back to the service.
#[derive(Clone, PartialEq, Eq)]
pub struct EditedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl EditedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "png",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for EditedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    pub source: PhotoSource,
    pub original_ref: PathBuf,
    pub edited: Option<EditedImage>,
    pub status: PhotoStatus,
    pub failure: Option<EditFailureKind>,
}

impl Photo {
    pub fn new(id: impl Into<String>, source: PhotoSource) -> Self {
        let original_ref = source.path.clone();
        Self {
            id: id.into(),
            source,
            original_ref,
            edited: None,
            status: PhotoStatus::Pending,
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "avif" => Some("image/avif"),
        "txt" => Some("text/plain"),
        "json" => Some("application/json"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
