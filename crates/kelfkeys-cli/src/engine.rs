//! Container engine wired into the binary
//!
//! The KELF cipher and container layout are not part of this workspace.
//! Until an engine crate is linked in, every container operation fails
//! after the keystore and profile have been fully resolved, so keystore
//! problems are still reported exactly as they would be in a full build.

use std::path::Path;

use kelfkeys_core::{ContainerEngine, HeaderKind, KeyProfile};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no KELF container engine is linked into this build ({operation} {path})")]
    Unavailable { operation: &'static str, path: String },
}

/// Engine placeholder used by the `kelfkeys` binary
pub struct DetachedEngine;

/// Never constructed; only names the container type
pub enum NoContainer {}

fn unavailable(operation: &'static str, path: &Path) -> EngineError {
    EngineError::Unavailable { operation, path: path.display().to_string() }
}

impl ContainerEngine for DetachedEngine {
    type Container = NoContainer;
    type Error = EngineError;

    fn load_container(&self, _profile: &KeyProfile, path: &Path) -> Result<NoContainer, EngineError> {
        Err(unavailable("load container", path))
    }

    fn save_content(&self, container: &NoContainer, _path: &Path) -> Result<(), EngineError> {
        match *container {}
    }

    fn load_content(
        &self,
        _profile: &KeyProfile,
        path: &Path,
        _header: Option<HeaderKind>,
    ) -> Result<NoContainer, EngineError> {
        Err(unavailable("load content", path))
    }

    fn save_container(
        &self,
        container: &NoContainer,
        _header: Option<HeaderKind>,
        _path: &Path,
    ) -> Result<(), EngineError> {
        match *container {}
    }
}
