use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

/// Writes JSON snapshots of pipeline stages as
/// `kag_<stage>_<unix_millis>.json`. Write failures are logged and ignored.
#[derive(Debug, Clone)]
pub struct DebugSink {
    dir: PathBuf,
}

impl DebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write<T: Serialize + ?Sized>(&self, stage: &str, data: &T) -> Option<PathBuf> {
        let path = self.dir.join(format!("kag_{}_{}.json", stage, chrono::Utc::now().timestamp_millis()));
        let result = std::fs::create_dir_all(&self.dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| Ok(serde_json::to_vec_pretty(data)?))
            .and_then(|bytes| Ok(std::fs::write(&path, bytes)?));
        match result {
            Ok(()) => {
                debug!(stage, path = %path.display(), "wrote debug snapshot");
                Some(path)
            }
            Err(e) => {
                warn!(stage, error = %e, "failed to write debug snapshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_named_json_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sink = DebugSink::new(tmp.path().join("debug"));
        let path = sink.write("normalized", &serde_json::json!({"query": "rust"})).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("kag_normalized_") && name.ends_with(".json"));
        let parsed: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed["query"], "rust");
    }

    #[test]
    fn unwritable_dir_is_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(DebugSink::new(blocker.join("nested")).write("stage", &1).is_none());
    }
}
