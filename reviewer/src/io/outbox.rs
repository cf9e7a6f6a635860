//! Numbered on-disk entries shared by the local tracker and chat adapters.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

const MAX_KEYS: u32 = 100_000;

/// Create `<root>/<prefix>-<n>` for the smallest free `n` and return its name.
///
/// `create_dir` fails on existing directories, so concurrent runs sharing a
/// root never receive the same key.
pub fn allocate_dir(root: &Path, prefix: &str) -> Result<(String, PathBuf)> {
    fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))?;
    for n in 1..=MAX_KEYS {
        let key = format!("{prefix}-{n}");
        let dir = root.join(&key);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((key, dir)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("create {}", dir.display()));
            }
        }
    }
    Err(anyhow!(
        "no free {prefix} key under {} (too many entries)",
        root.display()
    ))
}

/// Append a numbered text entry (`001.md`, `002.md`, ...) to `dir`.
pub fn append_entry(dir: &Path, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let existing = fs::read_dir(dir)
        .with_context(|| format!("list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
        .count();
    let path = dir.join(format!("{:03}.md", existing + 1));
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Store `bytes` as `<dir>/<filename>`, rejecting names that escape `dir`.
pub fn store_file(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    let name = Path::new(filename);
    if name.components().count() != 1 || name.file_name().is_none() {
        return Err(anyhow!("invalid attachment name '{filename}'"));
    }
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(name);
    fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Read numbered entries of `dir` in order.
pub fn read_entries(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|path| fs::read_to_string(path).with_context(|| format!("read {}", path.display())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (first, _) = allocate_dir(temp.path(), "REV").expect("first");
        let (second, _) = allocate_dir(temp.path(), "REV").expect("second");
        assert_eq!(first, "REV-1");
        assert_eq!(second, "REV-2");
    }

    #[test]
    fn entries_read_back_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        append_entry(temp.path(), "one").expect("one");
        append_entry(temp.path(), "two").expect("two");
        assert_eq!(read_entries(temp.path()).expect("read"), vec!["one", "two"]);
    }

    #[test]
    fn store_file_rejects_traversal() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(store_file(temp.path(), "../escape.json", b"{}").is_err());
        assert!(store_file(temp.path(), "report.json", b"{}").is_ok());
    }
}
