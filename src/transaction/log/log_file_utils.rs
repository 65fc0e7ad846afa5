use std::io;
use std::path::{Path, PathBuf};

use crate::common::types::LogVersion;

/// File name of a log segment: `<base>.<version>`
pub fn log_file_name(base_name: &str, version: LogVersion) -> String {
    format!("{}.{}", base_name, version)
}

/// Version of a segment file, or `None` if the file is not a segment of `base_name`
pub fn extract_version_from_path(base_name: &str, path: &Path) -> Option<LogVersion> {
    let file_name = path.file_name()?.to_str()?;
    let suffix = file_name.strip_prefix(base_name)?.strip_prefix('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<LogVersion>().ok()
}

/// All segment files of `base_name` in `dir`, sorted by version. A missing
/// directory has no segments.
pub fn find_log_files(dir: &Path, base_name: &str) -> io::Result<Vec<(LogVersion, PathBuf)>> {
    let mut log_files = Vec::new();
    if !dir.exists() {
        return Ok(log_files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(version) = extract_version_from_path(base_name, &path) {
            log_files.push((version, path));
        }
    }
    log_files.sort_by_key(|(version, _)| *version);
    Ok(log_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_version() {
        let base = "neostore.transaction.db";
        assert_eq!(extract_version_from_path(base, Path::new("/x/neostore.transaction.db.12")), Some(12));
        assert_eq!(extract_version_from_path(base, Path::new("/x/neostore.transaction.db.")), None);
        assert_eq!(extract_version_from_path(base, Path::new("/x/neostore.transaction.db.1a")), None);
        assert_eq!(extract_version_from_path(base, Path::new("/x/neostore.transaction.db")), None);
        assert_eq!(extract_version_from_path(base, Path::new("/x/checkpoint.3")), None);
    }

    #[test]
    fn test_find_sorted_by_version() {
        let temp_dir = TempDir::new().unwrap();
        for version in [10u64, 2, 7] {
            std::fs::write(temp_dir.path().join(log_file_name("log", version)), b"").unwrap();
        }
        std::fs::write(temp_dir.path().join("log.tmp"), b"").unwrap();
        std::fs::write(temp_dir.path().join("other.1"), b"").unwrap();

        let versions: Vec<_> = find_log_files(temp_dir.path(), "log")
            .unwrap()
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        assert_eq!(versions, vec![2, 7, 10]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(find_log_files(&missing, "log").unwrap().is_empty());
        assert!(!missing.exists());
    }
}
