use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::warn;
use upkeep_core::UpdateMode;

pub const LAST_UPDATE_CHECK: &str = "last_update_check";
pub const UPDATE_INTERVAL_HOURS: &str = "update_interval_hours";
pub const UPDATE_CHECK_STARTUP: &str = "update_check_startup";
pub const UPDATE_SOURCE: &str = "update_source";
pub const AUTO_UPDATE_CHECK: &str = "auto_update_check";
pub const KIOSK_MODE: &str = "kiosk_mode";
pub const KIOSK_DELAY: &str = "kiosk_delay";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

const TIMESTAMP_PARSE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Raw string storage for persisted preferences.
pub trait SettingsStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    fn set_raw(&self, key: &str, value: &str) -> Result<()>;
}

/// `settings.toml`: a flat table of string values. The file is shared with
/// the foreground process, so every read goes to disk and every write merges
/// a single key into the current file contents.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettings {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let settings = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };
        settings.load()?;
        Ok(settings)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings: {}", self.path.display()));
            }
        };
        toml::from_str::<BTreeMap<String, String>>(&raw)
            .with_context(|| format!("failed to parse settings: {}", self.path.display()))
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let rendered = toml::to_string(values).context("failed to serialize settings")?;
        let tmp = self.path.with_extension(format!(
            "toml.tmp-{}-{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, rendered)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(err)
                .with_context(|| format!("failed to replace settings: {}", self.path.display()));
        }
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, String>>,
}

#[cfg(test)]
impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl SettingsStore for MemorySettings {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed view over a [`SettingsStore`]. Missing or empty values yield the
/// caller's default; values that fail to coerce are logged and also yield
/// the default.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    fn raw(&self, key: &str) -> Option<String> {
        match self.store.get_raw(key) {
            Ok(value) => value.filter(|value| !value.trim().is_empty()),
            Err(err) => {
                warn!(key, error = %format!("{err:#}"), "failed to read setting");
                None
            }
        }
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.raw(key) else {
            return default;
        };
        match parse_bool(&raw) {
            Some(value) => value,
            None => {
                warn!(key, value = %raw, "setting is not a boolean, using default");
                default
            }
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        let Some(raw) = self.raw(key) else {
            return default;
        };
        match parse_int(&raw) {
            Some(value) => value,
            None => {
                warn!(key, value = %raw, "setting is not an integer, using default");
                default
            }
        }
    }

    pub fn get_timestamp(&self, key: &str, default: NaiveDateTime) -> NaiveDateTime {
        let Some(raw) = self.raw(key) else {
            return default;
        };
        match parse_timestamp(&raw) {
            Some(value) => value,
            None => {
                warn!(key, value = %raw, "setting is not a timestamp, using default");
                default
            }
        }
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .set_raw(key, value)
            .with_context(|| format!("failed to store setting '{key}'"))
    }

    pub fn set_timestamp(&self, key: &str, value: NaiveDateTime) -> Result<()> {
        self.set_string(key, &value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn last_update_check(&self) -> NaiveDateTime {
        self.get_timestamp(LAST_UPDATE_CHECK, NaiveDateTime::default())
    }

    pub fn update_interval_hours(&self) -> i64 {
        self.get_int(UPDATE_INTERVAL_HOURS, 4)
    }

    pub fn update_check_startup(&self) -> bool {
        self.get_bool(UPDATE_CHECK_STARTUP, true)
    }

    pub fn update_source(&self) -> String {
        self.get_string(UPDATE_SOURCE, UpdateMode::Repository.as_str())
    }

    pub fn auto_update_check(&self) -> bool {
        self.get_bool(AUTO_UPDATE_CHECK, true)
    }

    pub fn kiosk_mode(&self) -> bool {
        self.get_bool(KIOSK_MODE, false)
    }

    pub fn kiosk_delay(&self) -> u64 {
        self.get_int(KIOSK_DELAY, 0).max(0) as u64
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Integers may be stored as float text by the host; those truncate.
pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok().filter(|value| value.is_finite())?;
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
