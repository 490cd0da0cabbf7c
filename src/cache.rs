//! Codebook persistence. The cache stores one bundle and is all-or-nothing.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::codebook::CodebookArtifacts;

pub trait CodebookCache: Send + Sync {
    /// `Ok(None)` is a cache miss.
    fn load(&self) -> Result<Option<CodebookArtifacts>>;

    fn save(&self, artifacts: &CodebookArtifacts) -> Result<()>;

    /// Exclusive build lock, held from a cache miss until the rebuilt bundle
    /// is saved. `None` means the cache has a single writer anyway.
    fn lock(&self) -> Result<Option<BuildLock>> {
        Ok(None)
    }
}

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(300);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lock file owned by one builder. Removed on drop.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Create `path` exclusively, polling while another process holds it.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Holder's pid, for anyone clearing a stale lock by hand.
                    let _ = writeln!(file, "{}", std::process::id());
                    tracing::debug!(path = %path.display(), "acquired build lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        anyhow::bail!(
                            "Timed out waiting for build lock {}; remove it if no build is running",
                            path.display()
                        );
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Failed to create build lock {}", path.display()))
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to remove build lock");
        }
    }
}

/// JSON bundle at a fixed path.
///
/// Writes go to a temporary file in the same directory that is renamed into
/// place, so readers see either the old bundle or the new one.
#[derive(Clone, Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long a builder waits for another process's build to finish.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<cache path>.lock`, in the same directory as the bundle.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Delete the bundle so the next load misses.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove codebook cache {}", self.path.display())),
        }
    }
}

impl CodebookCache for JsonFileCache {
    fn load(&self) -> Result<Option<CodebookArtifacts>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to open codebook cache {}", self.path.display())
                })
            }
        };
        let artifacts = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse codebook cache {}", self.path.display()))?;
        Ok(Some(artifacts))
    }

    fn save(&self, artifacts: &CodebookArtifacts) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir).context("Failed to create temporary cache file")?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, artifacts).context("Failed to serialize codebook")?;
            writer.flush().context("Failed to write codebook cache")?;
        }
        temp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("Failed to write codebook cache {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "saved codebook cache");
        Ok(())
    }

    fn lock(&self) -> Result<Option<BuildLock>> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
        }
        BuildLock::acquire(&self.lock_path(), self.lock_timeout).map(Some)
    }
}

/// In-process cache, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Mutex<Option<CodebookArtifacts>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl CodebookCache for MemoryCache {
    fn load(&self) -> Result<Option<CodebookArtifacts>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Codebook cache lock poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&self, artifacts: &CodebookArtifacts) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Codebook cache lock poisoned"))?;
        *slot = Some(artifacts.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::tests::cat_codebook;
    use tempfile::TempDir;

    #[test]
    fn test_json_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested").join("codebook.json"));
        assert!(cache.load().unwrap().is_none());

        let artifacts = cat_codebook().artifacts().clone();
        cache.save(&artifacts).unwrap();
        assert_eq!(cache.load().unwrap(), Some(artifacts));

        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
        cache.clear().unwrap();
    }

    #[test]
    fn test_json_cache_overwrites() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("codebook.json"));
        let mut artifacts = cat_codebook().artifacts().clone();
        cache.save(&artifacts).unwrap();
        artifacts.fingerprint = "second".to_string();
        cache.save(&artifacts).unwrap();
        assert_eq!(cache.load().unwrap().unwrap().fingerprint, "second");
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codebook.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonFileCache::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse codebook cache"));
    }

    #[test]
    fn test_build_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("codebook.json"))
            .with_lock_timeout(Duration::from_millis(120));
        let lock_path = dir.path().join("codebook.json.lock");
        assert_eq!(cache.lock_path(), lock_path);

        let held = cache.lock().unwrap().unwrap();
        assert_eq!(held.path(), lock_path.as_path());
        assert!(lock_path.exists());

        let err = cache.lock().unwrap_err();
        assert!(err.to_string().contains("Timed out waiting for build lock"));

        drop(held);
        assert!(!lock_path.exists());
        assert!(cache.lock().unwrap().is_some());
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.load().unwrap().is_none());
        let artifacts = cat_codebook().artifacts().clone();
        cache.save(&artifacts).unwrap();
        assert_eq!(cache.load().unwrap(), Some(artifacts));
        cache.clear();
        assert!(cache.load().unwrap().is_none());
        assert!(cache.lock().unwrap().is_none());
    }
}
