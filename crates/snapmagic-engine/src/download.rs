use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use snapmagic_contracts::photos::PhotoRegistry;

const DEFAULT_EXTENSION: &str = "png";

/// One saved edit: which photo it came from and where it landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPhoto {
    pub photo_id: String,
    pub path: PathBuf,
}

/// `{stem}-edited-{index}.{ext}`, splitting on the last `.` of the original
/// name. Names without an extension get `png`.
pub fn edited_file_name(original_name: &str, index: usize) -> String {
    let (stem, ext) = match original_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, ext),
        Some((stem, _)) => (stem, DEFAULT_EXTENSION),
        None => (original_name, DEFAULT_EXTENSION),
    };
    format!("{stem}-edited-{index}.{ext}")
}

/// Writes every `Done` photo's edited image into `out_dir`, numbering them in
/// registry order.
pub fn download_all(registry: &PhotoRegistry, out_dir: &Path) -> Result<Vec<DownloadedPhoto>> {
    let done = registry.done();
    if done.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut saved = Vec::with_capacity(done.len());
    for (index, photo) in done.into_iter().enumerate() {
        let Some(edited) = photo.edited.as_ref() else {
            continue;
        };
        let path = out_dir.join(edited_file_name(photo.name(), index));
        fs::write(&path, &edited.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        saved.push(DownloadedPhoto {
            photo_id: photo.id.clone(),
            path,
        });
    }
    Ok(saved)
}
