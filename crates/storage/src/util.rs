use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::Path;

/// Writes data atomically by using a temporary sibling file followed by rename.
/// 以臨時檔案搭配 rename 實現原子寫入。
///
/// The temporary name appends `.tmp` to the full file name instead of
/// replacing the extension: version content files such as `1.0.txt` live next
/// to `versions.json`, and extension swapping would let their temporaries
/// collide.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_creates_parents_and_replaces() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("index.json");

        write_atomic(&target, b"first").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "first");

        write_atomic(&target, b"second").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        assert!(!target.with_file_name("index.json.tmp").exists());
    }

    #[test]
    fn sibling_files_use_distinct_temporaries() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("1.0.txt");
        let json = dir.path().join("1.0.json");

        write_atomic(&text, b"content").unwrap();
        write_atomic(&json, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&text).unwrap(), "content");
        assert_eq!(fs::read_to_string(&json).unwrap(), "{}");
    }
}
