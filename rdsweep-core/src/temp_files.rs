//! Temporary file management utilities.
//!
//! Metric logs only live for the duration of one measurement. They are
//! created through the tempfile crate inside the batch scratch directory and
//! removed when the handle is dropped, also on error paths.

use crate::error::CoreResult;

use std::path::Path;
use tempfile::{Builder as TempFileBuilder, NamedTempFile};

/// Creates a temporary file `<prefix>.<random>.<extension>` in `dir`.
/// Auto-deleted when dropped.
pub fn create_temp_file(dir: &Path, prefix: &str, extension: &str) -> CoreResult<NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    let temp_file = TempFileBuilder::new()
        .prefix(&format!("{prefix}."))
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)?;

    Ok(temp_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let file = create_temp_file(&dir.path().join("nested"), "psnr", "log").unwrap();
            let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("psnr."));
            assert!(name.ends_with(".log"));
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
