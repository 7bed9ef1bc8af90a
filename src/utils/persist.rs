use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write a file atomically.
///
/// `write` receives a buffered writer over a temporary file created in the
/// destination directory; on success the temporary file is renamed over
/// `path`. Readers never observe a partially written file, and a crash leaves
/// at most a stray temporary file behind.
///
/// Parent directories are created if missing.
pub fn atomic_write<P, F>(path: P, write: F) -> crate::Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<&File>) -> crate::Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| crate::Error::Io(e.error))?;
    Ok(())
}

/// Atomically write `value` as pretty-printed JSON.
pub fn atomic_write_json<P, T>(path: P, value: &T) -> crate::Result<()>
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    atomic_write(path, |w| {
        serde_json::to_writer_pretty(&mut *w, value)?;
        w.write_all(b"\n")?;
        Ok(())
    })
}

/// Read a JSON document.
pub fn read_json<P, T>(path: P) -> crate::Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");

        atomic_write_json(&path, &vec!["a", "b"]).unwrap();
        atomic_write_json(&path, &vec!["c"]).unwrap();

        let back: Vec<String> = read_json(&path).unwrap();
        assert_eq!(back, vec!["c".to_string()]);

        // Only the final file remains, no temporaries.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_atomic_write_failure_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.json");
        atomic_write_json(&path, &vec![1, 2, 3]).unwrap();

        let res = atomic_write(&path, |_w| Err(crate::Error::EmptyAudio));
        assert!(res.is_err());

        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("x.json");
        atomic_write_json(&path, &"hello").unwrap();
        assert!(path.is_file());
    }
}
