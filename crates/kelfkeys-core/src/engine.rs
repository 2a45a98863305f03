//! Container engine interface
//!
//! The engine owns the KELF byte layout and the cipher/MAC. The dispatcher
//! only hands it a validated profile and user paths, and never looks inside
//! a loaded container.

use std::path::Path;

use crate::profile::{HeaderKind, KeyProfile};

pub trait ContainerEngine {
    /// A loaded container, opaque to the dispatcher
    type Container;
    /// Engine failure, reported to the user unchanged
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read, decrypt and verify a signed container
    fn load_container(&self, profile: &KeyProfile, path: &Path)
        -> Result<Self::Container, Self::Error>;

    /// Write the decrypted payload of a loaded container
    fn save_content(&self, container: &Self::Container, path: &Path) -> Result<(), Self::Error>;

    /// Read a plain payload to be wrapped. `header` is `None` only for
    /// arcade profiles given an unrecognized header token.
    fn load_content(
        &self,
        profile: &KeyProfile,
        path: &Path,
        header: Option<HeaderKind>,
    ) -> Result<Self::Container, Self::Error>;

    /// Encrypt, sign and write a container
    fn save_container(
        &self,
        container: &Self::Container,
        header: Option<HeaderKind>,
        path: &Path,
    ) -> Result<(), Self::Error>;
}
