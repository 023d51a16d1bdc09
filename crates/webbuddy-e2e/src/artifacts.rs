//! Timestamped paths for diagnostic artifacts.
//!
//! Files are named `<timestamp>-<label>` where the timestamp is ISO 8601 UTC
//! with `:` and `.` replaced by `-`, e.g.
//! `2026-10-18T09-15-02-117Z-content-not-injected.png`. Two requests for the
//! same label within one millisecond get a sequence number between the
//! timestamp and the label.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory of saved artifacts plus the collision bookkeeping for it.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    last: Mutex<(String, u32)>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last: Mutex::new((String::new(), 0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns a fresh path for `label`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors from creating the directory.
    pub fn path(&self, label: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(self.file_name(Utc::now(), label)))
    }

    /// Writes `bytes` under a fresh path for `label`.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors.
    pub async fn write(&self, label: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path(label)?;
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), "artifact saved");
        Ok(path)
    }

    fn file_name(&self, now: DateTime<Utc>, label: &str) -> String {
        let stamp = timestamp(now);
        let mut last = self.last.lock();
        if last.0 == stamp {
            last.1 += 1;
            format!("{stamp}-{}-{label}", last.1)
        } else {
            *last = (stamp.clone(), 0);
            format!("{stamp}-{label}")
        }
    }
}

/// ISO 8601 UTC with millisecond precision, filesystem safe.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 2).unwrap()
            + chrono::Duration::milliseconds(117)
    }

    #[test]
    fn timestamp_replaces_colons_and_dots() {
        assert_eq!(timestamp(fixed()), "2026-10-18T09-15-02-117Z");
    }

    #[test]
    fn same_millisecond_names_do_not_collide() {
        let store = ArtifactStore::new("unused");
        let a = store.file_name(fixed(), "shot.png");
        let b = store.file_name(fixed(), "shot.png");
        let c = store.file_name(fixed() + chrono::Duration::milliseconds(1), "shot.png");

        assert_eq!(a, "2026-10-18T09-15-02-117Z-shot.png");
        assert_eq!(b, "2026-10-18T09-15-02-117Z-1-shot.png");
        assert_eq!(c, "2026-10-18T09-15-02-118Z-shot.png");
    }

    #[test]
    fn path_creates_directory_idempotently() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path().join("test").join("artifacts"));

        let first = store.path("a.png").unwrap();
        let second = store.path("a.png").unwrap();

        assert!(store.dir().is_dir());
        assert_eq!(first.parent(), Some(store.dir()));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn write_persists_bytes() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path());
        let path = store.write("log.txt", b"hello").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("-log.txt"));
    }
}
