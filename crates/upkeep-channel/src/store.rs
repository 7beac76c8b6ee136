use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};

/// Backing storage for channel entries. A missing entry reads as the empty
/// string, and a single `set` must be observed whole or not at all.
pub trait ChannelStore: Send + Sync {
    fn get(&self, key: &str) -> Result<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn entries(&self) -> Result<BTreeMap<String, String>>;
}

impl<T: ChannelStore + ?Sized> ChannelStore for Arc<T> {
    fn get(&self, key: &str) -> Result<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        (**self).entries()
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One file per entry inside a directory both processes can reach. Writes go
/// through a temp file and a rename so readers never see a partial value.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create channel dir: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl ChannelStore for FileStore {
    fn get(&self, key: &str) -> Result<String> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(value),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read channel entry: {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let tmp = self.root.join(format!(
            ".{key}.tmp-{}-{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, value.as_bytes())
            .with_context(|| format!("failed to stage channel entry: {}", tmp.display()))?;
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(err)
                .with_context(|| format!("failed to publish channel entry: {}", path.display()));
        }
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        let mut entries = BTreeMap::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to read channel dir: {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            entries.insert(name.clone(), self.get(&name)?);
        }
        Ok(entries)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
    if !valid {
        return Err(anyhow!("invalid channel key '{key}'"));
    }
    Ok(())
}

/// In-process store, used when both sides live in one process and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelStore for MemoryStore {
    fn get(&self, key: &str) -> Result<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned().unwrap_or_default())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.clone())
    }
}
