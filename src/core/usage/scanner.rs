use std::path::{Path, PathBuf};

/// Session log files end with this suffix.
const LOG_SUFFIX: &str = ".jsonl";

/// Recursively collect every session log file under `root`.
///
/// Directories or entries that can't be read are skipped; a partial listing
/// is returned rather than an error. Order is unspecified.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_recursive(root, &mut files);
    files
}

fn collect_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "Skipping unreadable directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        // Follow symlinks like a plain stat would.
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Skipping inaccessible entry");
                continue;
            }
        };
        if metadata.is_dir() {
            collect_recursive(&path, files);
        } else if is_log_file(&path) {
            files.push(path);
        }
    }
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(LOG_SUFFIX))
}

/// Modification time as milliseconds since the Unix epoch, if it can be read.
pub fn mtime_ms(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}
