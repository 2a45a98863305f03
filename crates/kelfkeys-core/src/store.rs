//! Loaded key profiles for one command invocation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::profile::{KeyProfile, ProfileKind};

/// Validated profiles read from a single keystore file
///
/// Built by the loader and read-only afterwards. Drop it when the command
/// finishes; the profiles wipe their key bytes on drop.
#[derive(Debug)]
pub struct KeyProfileStore {
    source: PathBuf,
    profiles: BTreeMap<ProfileKind, KeyProfile>,
}

impl KeyProfileStore {
    pub(crate) fn new(source: PathBuf, profiles: BTreeMap<ProfileKind, KeyProfile>) -> Self {
        Self { source, profiles }
    }

    /// Path the profiles were read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn get(&self, kind: ProfileKind) -> Option<&KeyProfile> {
        self.profiles.get(&kind)
    }

    pub fn contains(&self, kind: ProfileKind) -> bool {
        self.profiles.contains_key(&kind)
    }

    /// Kinds present, in `Retail, Dev, Proto, Arcade` order
    pub fn kinds(&self) -> impl Iterator<Item = ProfileKind> + '_ {
        self.profiles.keys().copied()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &KeyProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
