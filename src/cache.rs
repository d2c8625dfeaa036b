//! Durable storage for synthesis results.
//!
//! Entries are keyed by the exact `input_data` structure a synthesis call was
//! made with. A result is written once, after all post-processing, and never
//! modified afterwards.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VoiceoverError;
use crate::SynthesisResult;

/// File name of the single-file cache layout.
pub const CACHE_JSON_FILENAME: &str = "cache.json";

const BASENAME_TEXT_CHARS: usize = 50;
const BASENAME_HASH_CHARS: usize = 16;

/// Lookup key for one synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    /// Hex SHA-256 of the compact JSON encoding of `input_data`.
    pub hash: String,
    pub input_data: serde_json::Value,
}

impl CacheKey {
    pub fn new(input_data: serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(input_data.to_string().as_bytes());
        Self {
            hash: hex::encode(hasher.finalize()),
            input_data,
        }
    }

    /// Human-readable file stem for the audio of this request.
    ///
    /// A slug of the start of the narration followed by a hash prefix, e.g.
    /// `hello-world-3f2a9c0d1e4b5a6f`.
    pub fn audio_basename(&self) -> String {
        let text = self
            .input_data
            .get("input_text")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let mut slug = String::new();
        for ch in text.chars().take(BASENAME_TEXT_CHARS) {
            if ch.is_alphanumeric() {
                slug.extend(ch.to_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');

        let hash = self.hash.get(..BASENAME_HASH_CHARS).unwrap_or(self.hash.as_str());
        if slug.is_empty() {
            hash.to_string()
        } else {
            format!("{slug}-{hash}")
        }
    }
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Storage for synthesis results.
pub trait CacheStore {
    /// Return the stored result whose `input_data` equals `key.input_data`.
    fn get(&self, key: &CacheKey) -> Result<Option<SynthesisResult>, VoiceoverError>;

    /// Store a fully processed result.
    fn put(&mut self, key: &CacheKey, result: &SynthesisResult) -> Result<(), VoiceoverError>;
}

/// How results are laid out inside the cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheLayout {
    /// One `<hash>.json` file per entry.
    #[default]
    EntryDir,
    /// A single `cache.json` array of entries.
    JsonList,
}

impl CacheLayout {
    pub fn open(self, dir: &Path) -> Box<dyn CacheStore> {
        match self {
            CacheLayout::EntryDir => Box::new(EntryDirCache::new(dir)),
            CacheLayout::JsonList => Box::new(JsonListCache::new(dir.join(CACHE_JSON_FILENAME))),
        }
    }
}

/// One JSON file per entry, each written atomically.
///
/// Concurrent writers never clobber each other's entries.
#[derive(Debug, Clone)]
pub struct EntryDirCache {
    dir: PathBuf,
}

impl EntryDirCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.hash))
    }
}

impl CacheStore for EntryDirCache {
    fn get(&self, key: &CacheKey) -> Result<Option<SynthesisResult>, VoiceoverError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let result: SynthesisResult = serde_json::from_str(&content)?;
        if result.input_data != key.input_data {
            log::warn!(
                "Cache entry {} does not match its key; ignoring it",
                path.display()
            );
            return Ok(None);
        }
        Ok(Some(result))
    }

    fn put(&mut self, key: &CacheKey, result: &SynthesisResult) -> Result<(), VoiceoverError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        if path.exists() {
            log::debug!("Cache entry {} already present", path.display());
            return Ok(());
        }
        write_atomic(&self.dir, &path, &serde_json::to_vec_pretty(result)?)
    }
}

/// The `cache.json` layout: a JSON array scanned linearly on lookup.
///
/// Appends rewrite the whole file through a temp file, so readers never see a
/// half-written list. Two processes appending at once can still lose one
/// entry; prefer [`EntryDirCache`] when renders share a cache directory.
#[derive(Debug, Clone)]
pub struct JsonListCache {
    path: PathBuf,
}

impl JsonListCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Vec<SynthesisResult>, VoiceoverError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        if !value.is_array() {
            return Err(VoiceoverError::Cache(format!(
                "{} should contain a JSON list",
                self.path.display()
            )));
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl CacheStore for JsonListCache {
    fn get(&self, key: &CacheKey) -> Result<Option<SynthesisResult>, VoiceoverError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|entry| entry.input_data == key.input_data))
    }

    fn put(&mut self, key: &CacheKey, result: &SynthesisResult) -> Result<(), VoiceoverError> {
        let mut entries = self.load()?;
        if entries.iter().any(|entry| entry.input_data == key.input_data) {
            log::debug!("{} already holds this entry", self.path.display());
            return Ok(());
        }
        entries.push(result.clone());

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        write_atomic(&dir, &self.path, &serde_json::to_vec_pretty(&entries)?)
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), VoiceoverError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
