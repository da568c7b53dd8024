//! Legacy client-side pin storage
//!
//! The first iterations of Spoty kept the whole pin collection in a
//! local key-value store, serialized as a single array under a fixed
//! key. The persistence gateway superseded this, but the format is
//! still read for migration: the file is loaded wholesale on start and
//! overwritten wholesale on every mutation, never patched.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::warn;

use crate::models::pin::Pin;

/// Fixed key the pin array is stored under
pub const STORAGE_KEY: &str = "spotPins";

/// File-backed store holding the full pin collection
#[derive(Debug, Clone)]
pub struct LocalPinStore {
    path: PathBuf,
}

impl LocalPinStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalPinStore { path: path.into() }
    }

    /// Read the whole collection
    ///
    /// A missing or unreadable file yields an empty collection, as does
    /// a payload that no longer parses.
    pub fn load(&self) -> Vec<Pin> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not load pins from {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match value.get(STORAGE_KEY) {
            Some(pins) => serde_json::from_value(pins.clone()).unwrap_or_else(|e| {
                warn!("Could not load pins from {}: {}", self.path.display(), e);
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Overwrite the whole collection
    pub fn save(&self, pins: &[Pin]) -> Result<()> {
        let payload = serde_json::to_string(&json!({ STORAGE_KEY: pins }))?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}
