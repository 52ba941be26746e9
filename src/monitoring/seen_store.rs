use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::core::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenFile {
    #[serde(default)]
    seen_car_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    last_check: Option<DateTime<Utc>>,
}

// Older files carry naive local ISO-8601 stamps without an offset; those
// are read as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_timestamp(&value).map_err(serde::de::Error::custom))
        .transpose()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    value
        .parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid last_check `{}`: {}", value, e))
}

/// Listing ids already notified about. Grows monotonically; ids are only
/// ever added through `mark_seen`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeenState {
    ids: Vec<String>,
    index: HashSet<String>,
    last_check: Option<DateTime<Utc>>,
}

impl SeenState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Returns `true` when the id was not seen before.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        if self.index.insert(id.to_string()) {
            self.ids.push(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn record_check(&mut self, at: DateTime<Utc>) {
        self.last_check = Some(at);
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn from_file(file: SeenFile) -> Self {
        let mut state = Self {
            last_check: file.last_check,
            ..Self::default()
        };
        for id in &file.seen_car_ids {
            state.mark_seen(id);
        }
        state
    }

    fn to_file(&self) -> SeenFile {
        SeenFile {
            seen_car_ids: self.ids.clone(),
            last_check: self.last_check,
        }
    }
}

/// JSON-file persistence for `SeenState`. Not safe for concurrent runs.
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is a first run and yields an empty state. Anything
    /// unreadable is an error rather than a silent reset.
    pub async fn load(&self) -> Result<SeenState, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("📂 No seen-set at {}, starting fresh", self.path.display());
                return Ok(SeenState::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: SeenFile = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let state = SeenState::from_file(file);

        tracing::debug!(
            "Loaded {} seen ids from {} (last check: {:?})",
            state.len(),
            self.path.display(),
            state.last_check()
        );
        Ok(state)
    }

    /// Write-to-temp, fsync, rename: the target is always either the old or
    /// the new complete file.
    pub async fn save(&self, state: &SeenState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&state.to_file())?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp_path).await.map_err(write_err)?;
        file.write_all(&json).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(source));
        }

        tracing::debug!("💾 Saved {} seen ids to {}", state.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("seen_cars.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
