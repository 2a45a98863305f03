//! Keystore location resolution
//!
//! Default search order:
//! 1. `$HOME/PS2KEYS.dat` (next to the executable on Windows)
//! 2. `./PS2KEYS.dat`
//!
//! Only a keystore that cannot be opened falls through to the next
//! location. A keystore that opens but is malformed stops the search.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::KeystoreError;
use crate::loader;
use crate::store::KeyProfileStore;

/// File name looked up in every default location
pub const KEYSTORE_FILE: &str = "PS2KEYS.dat";

/// Ordered list of keystore locations to try
#[derive(Debug, Clone)]
pub struct KeystoreResolver {
    candidates: Vec<PathBuf>,
}

impl KeystoreResolver {
    /// Platform default locations
    pub fn platform() -> Self {
        let mut candidates = Vec::with_capacity(2);
        match canonical_path() {
            Some(path) => candidates.push(path),
            None => debug!("no canonical keystore location on this system"),
        }
        candidates.push(Path::new(".").join(KEYSTORE_FILE));
        Self { candidates }
    }

    /// Exactly one location, no fallback
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self { candidates: vec![path.into()] }
    }

    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Load the first keystore that can be opened
    pub fn load(&self) -> Result<KeyProfileStore, KeystoreError> {
        let mut last_open_error = None;

        for (idx, path) in self.candidates.iter().enumerate() {
            debug!(path = %path.display(), "trying keystore");
            match loader::load(path) {
                Ok(store) => {
                    info!(path = %path.display(), profiles = store.len(), "keystore loaded");
                    return Ok(store);
                }
                Err(e) if e.is_open_failure() => {
                    if idx + 1 < self.candidates.len() {
                        warn!(error = %e, "keystore unavailable, trying next location");
                    }
                    last_open_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_open_error.unwrap_or_else(|| KeystoreError::OpenFailed {
            path: PathBuf::from(KEYSTORE_FILE),
            reason: "no keystore location to try".to_string(),
        }))
    }
}

impl Default for KeystoreResolver {
    fn default() -> Self {
        Self::platform()
    }
}

/// Per-user (or per-install on Windows) keystore location
#[cfg(not(windows))]
pub fn canonical_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(KEYSTORE_FILE))
}

/// Per-user (or per-install on Windows) keystore location
#[cfg(windows)]
pub fn canonical_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(|dir| dir.join(KEYSTORE_FILE))
}
