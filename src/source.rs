use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::model::RawFile;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Loads every workbook in a directory as [`RawFile`]s.
///
/// Extensions match case-insensitively and files are sorted by name, so a
/// directory always compiles in a deterministic order regardless of how the
/// filesystem lists it. Non-workbook files are ignored and logged.
pub fn load_directory(dir: &Path) -> Result<Vec<RawFile>> {
    if !dir.is_dir() {
        return Err(CompileError::MissingInput(dir.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|candidate| ext.eq_ignore_ascii_case(candidate))
            })
            .unwrap_or(false);
        if supported {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "ignoring non-workbook file");
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(&path)?;
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        files.push(RawFile {
            id,
            bytes,
            modified,
        });
    }
    Ok(files)
}
