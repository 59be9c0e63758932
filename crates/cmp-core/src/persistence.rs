//! Persistence hook for the encoded consent record.
//!
//! The engine stores the consent string produced by the codec; the hook only
//! moves opaque text in and out.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub trait ConsentPersistence: Send + Sync {
    /// Previously saved consent string, if any.
    fn load(&self) -> io::Result<Option<String>>;

    fn save(&self, encoded: &str) -> io::Result<()>;
}

/// Keeps the consent string in memory. Useful for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    value: Mutex<Option<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(encoded: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(encoded.into())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConsentPersistence for MemoryPersistence {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.current())
    }

    fn save(&self, encoded: &str) -> io::Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded.to_string());
        Ok(())
    }
}

/// Stores the consent string in a single file, replaced atomically.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConsentPersistence for FilePersistence {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let trimmed = content.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, encoded: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, encoded)?;
        std::fs::rename(&temp_path, &self.path)
    }
}
