//! Keystore file loader
//!
//! A keystore is a sectioned `KEY=HEX` text file:
//!
//! ```text
//! ; comments start with ';' or '#'
//! [Retail]
//! MG_SIG_MASTER_KEY=00112233445566778899AABBCCDDEEFF
//! ...
//! ```
//!
//! Sections named `Retail`, `Dev`, `Proto` or `Arcade` become profiles.
//! Other sections are skipped and unknown keys are ignored. Everything else
//! is fail-closed: the first malformed line, odd-length value, bad hex digit
//! or incomplete profile aborts the whole load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroize;

use crate::error::KeystoreError;
use crate::hex;
use crate::profile::{KeyField, KeyProfile, ProfileKind};
use crate::store::KeyProfileStore;

/// One `[name]` block, duplicates already merged
struct Section<'a> {
    name: &'a str,
    entries: Vec<(&'a str, &'a str)>,
}

impl<'a> Section<'a> {
    fn insert(&mut self, key: &'a str, value: &'a str) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// Read and validate the keystore at `path`
pub fn load(path: &Path) -> Result<KeyProfileStore, KeystoreError> {
    let raw = fs::read(path).map_err(|e| KeystoreError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let text = String::from_utf8(raw).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        KeystoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: "not valid UTF-8 text".to_string(),
        }
    })?;

    let result = parse(&text, path);
    let mut text = text;
    text.zeroize();
    result
}

/// Validate keystore text; `origin` is only used in errors and the store
pub fn parse(text: &str, origin: &Path) -> Result<KeyProfileStore, KeystoreError> {
    let sections = split_sections(text, origin)?;
    let mut profiles = BTreeMap::new();

    for section in sections {
        let Some(kind) = ProfileKind::from_section(section.name) else {
            debug!(section = section.name, "skipping unknown keystore section");
            continue;
        };

        let profile = build_profile(kind, &section)?;
        debug!(%kind, "keystore section validated");
        profiles.insert(kind, profile);
    }

    Ok(KeyProfileStore::new(PathBuf::from(origin), profiles))
}

fn build_profile(kind: ProfileKind, section: &Section<'_>) -> Result<KeyProfile, KeystoreError> {
    let mut profile = KeyProfile::empty(kind);

    for &(key, value) in &section.entries {
        if value.len() % 2 != 0 {
            return Err(KeystoreError::OddLengthValue {
                section: section.name.to_string(),
                key: key.to_string(),
            });
        }
        let mut bytes = hex::decode(value).map_err(|source| KeystoreError::InvalidEncoding {
            section: section.name.to_string(),
            key: key.to_string(),
            source,
        })?;

        match KeyField::for_key(key, kind) {
            Some(field) => profile.set(field, bytes),
            None => {
                debug!(section = section.name, key, "ignoring unknown key");
                bytes.zeroize();
            }
        }
    }

    let missing = profile.missing();
    if !missing.is_empty() {
        return Err(KeystoreError::MissingKey {
            section: section.name.to_string(),
            missing,
            arcade: kind == ProfileKind::Arcade,
        });
    }
    Ok(profile)
}

fn split_sections<'a>(text: &'a str, origin: &Path) -> Result<Vec<Section<'a>>, KeystoreError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    // Entries before the first header land in an unnamed section, which
    // never maps to a profile.
    let mut sections = vec![Section { name: "", entries: Vec::new() }];
    let mut current = 0;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            // `[name]`, optionally followed by a comment
            let header = rest.split_once(']').filter(|(_, tail)| {
                let tail = tail.trim_start();
                tail.is_empty() || tail.starts_with(';') || tail.starts_with('#')
            });
            let Some((name, _)) = header else {
                return Err(KeystoreError::LineNotKeyValue {
                    path: origin.to_path_buf(),
                    line: idx + 1,
                });
            };
            let name = name.trim();
            current = match sections.iter().position(|s| s.name == name) {
                Some(existing) => existing,
                None => {
                    sections.push(Section { name, entries: Vec::new() });
                    sections.len() - 1
                }
            };
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| KeystoreError::LineNotKeyValue {
            path: origin.to_path_buf(),
            line: idx + 1,
        })?;
        sections[current].insert(key.trim(), value.trim());
    }

    Ok(sections)
}
