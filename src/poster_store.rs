//! Poster files on disk, one `{call_number}.jpg` per catalog item.

use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ASSET_DIR: &str = "static/posters";

/// Existence check and write for poster assets keyed by call number.
pub trait AssetStore {
    fn exists(&self, call_number: &str) -> bool;
    fn write(&self, call_number: &str, bytes: &[u8]) -> Result<PathBuf, String>;
}

pub struct PosterDir {
    root: PathBuf,
}

impl PosterDir {
    /// Opens (creating if needed) the poster directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| format!("failed to create poster directory {}: {err}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, call_number: &str) -> PathBuf {
        self.root.join(format!("{call_number}.jpg"))
    }
}

impl AssetStore for PosterDir {
    fn exists(&self, call_number: &str) -> bool {
        self.path_for(call_number).is_file()
    }

    // Written beside the target and renamed, so an interrupted write never
    // leaves a file that a later run would treat as present.
    fn write(&self, call_number: &str, bytes: &[u8]) -> Result<PathBuf, String> {
        if call_number.is_empty() || !call_number.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(format!("refusing poster path for call number '{call_number}'"));
        }
        let target_path = self.path_for(call_number);
        let temp_path = target_path.with_extension("jpg.tmp");
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }
        fs::write(&temp_path, bytes)
            .map_err(|err| format!("failed to write {}: {err}", temp_path.display()))?;
        fs::rename(&temp_path, &target_path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            format!("failed to move poster into {}: {err}", target_path.display())
        })?;
        Ok(target_path)
    }
}

#[cfg(test)]
pub(crate) fn unique_temp_dir(name: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be valid")
        .as_nanos();
    std::env::temp_dir().join(format!("reelshelf_{name}_{nonce}"))
}
