mod photo;
mod registry;

pub use photo::{mime_for_path, EditFailureKind, EditedImage, Photo, PhotoSource, PhotoStatus};
pub use registry::PhotoRegistry;
