use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use time::macros::format_description;
use time::OffsetDateTime;

use super::document::GraphDocument;
use super::settings::AppSettings;

static SETTINGS_OVERRIDE: OnceLock<AppSettings> = OnceLock::new();

pub fn set_settings_override(settings: AppSettings) {
    let _ = SETTINGS_OVERRIDE.set(settings);
}

fn autosave_dir() -> PathBuf {
    // If an override is set (e.g. by the embedding shell or a test), use it.
    if let Some(settings) = SETTINGS_OVERRIDE.get() {
        return settings.autosave_dir();
    }
    // Load settings if present; else use defaults
    let settings = AppSettings::load().unwrap_or_default();
    settings.autosave_dir()
}

pub fn active_document_path() -> PathBuf {
    autosave_dir().join("graph.json")
}

pub fn versioned_document_path_now() -> PathBuf {
    let now = OffsetDateTime::now_utc();
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
    autosave_dir().join(format!("graph_{}.json", stamp))
}

fn ensure_autosave_dir() -> std::io::Result<()> {
    fs::create_dir_all(autosave_dir())
}

// Write through a temp file and rename, so a crash mid-write never leaves a
// truncated document behind.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

pub fn save_active(doc: &GraphDocument) -> anyhow::Result<PathBuf> {
    ensure_autosave_dir()?;
    let s = doc.to_json()?;
    let path = active_document_path();
    atomic_write(&path, s.as_bytes())?;
    Ok(path)
}

pub fn save_versioned(doc: &GraphDocument) -> anyhow::Result<PathBuf> {
    ensure_autosave_dir()?;
    let s = doc.to_json()?;
    let path = versioned_document_path_now();
    atomic_write(&path, s.as_bytes())?;
    Ok(path)
}

pub fn load_active() -> anyhow::Result<Option<GraphDocument>> {
    let path = active_document_path();
    if !path.exists() {
        return Ok(None);
    }
    load_from_path(&path).map(Some)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<GraphDocument> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let doc = GraphDocument::from_json(&buf)?;
    Ok(doc)
}

/// The active document, or the demonstration seed on a first-ever run (no
/// durable state present yet).
pub fn load_or_seed() -> anyhow::Result<GraphDocument> {
    if let Some(doc) = load_active()? {
        return Ok(doc);
    }
    let doc = GraphDocument::demo();
    save_active(&doc)?;
    Ok(doc)
}

pub fn list_versions() -> anyhow::Result<Vec<PathBuf>> {
    let dir = autosave_dir();
    let mut entries: Vec<PathBuf> = Vec::new();
    if dir.exists() {
        for e in fs::read_dir(dir)? {
            let p = e?.path();
            if let Some(name) = p.file_name().and_then(|s| s.to_str())
                && name.starts_with("graph_") && name.ends_with(".json")
            {
                entries.push(p);
            }
        }
    }
    // sort descending by filename (timestamp)
    entries.sort();
    entries.reverse();
    Ok(entries)
}

/// Default destination for an export given only a file name: the configured
/// export directory (user override, else the OS temporary directory).
pub fn export_path(file_name: &str) -> PathBuf {
    if let Some(settings) = SETTINGS_OVERRIDE.get() {
        return settings.export_dir().join(file_name);
    }
    let settings = AppSettings::load().unwrap_or_default();
    settings.export_dir().join(file_name)
}

/// Write the document where the user asked for it (the "Save Document"
/// download). Unlike the autosave this is an explicit action, so the caller
/// surfaces the error instead of retrying.
pub fn export_to(doc: &GraphDocument, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let s = doc.to_json()?;
    atomic_write(path, s.as_bytes())?;
    Ok(())
}

/// Debounced autosave bookkeeping: the controller flags changes every event
/// turn, the shell ticks this once per frame, and the actual write happens
/// at most once per debounce window.
pub struct Autosaver {
    debounce: Duration,
    dirty: bool,
    last_save: Instant,
}

impl Autosaver {
    pub fn new(debounce: Duration) -> Self {
        Autosaver { debounce, dirty: false, last_save: Instant::now() }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Save if anything changed and the debounce window has elapsed.
    /// Returns the written path when a save actually happened.
    pub fn tick(&mut self, doc: &GraphDocument) -> anyhow::Result<Option<PathBuf>> {
        if !self.dirty || self.last_save.elapsed() < self.debounce {
            return Ok(None);
        }
        let path = save_active(doc)?;
        self.dirty = false;
        self.last_save = Instant::now();
        Ok(Some(path))
    }

    /// Unconditional save (explicit user action); resets the debounce.
    pub fn flush(&mut self, doc: &GraphDocument) -> anyhow::Result<PathBuf> {
        let path = save_active(doc)?;
        self.dirty = false;
        self.last_save = Instant::now();
        Ok(path)
    }
}
