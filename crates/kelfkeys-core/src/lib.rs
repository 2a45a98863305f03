//! kelfkeys core - key profiles for KELF signed containers
//!
//! This crate provides:
//! - Hex decoding of key material
//! - Per-environment key profiles (retail, dev, proto, arcade)
//! - Keystore file parsing with fail-closed validation
//! - Keystore path resolution with fallback
//! - Command dispatch against a pluggable container engine
//!
//! The container cipher itself lives behind [`ContainerEngine`]. This crate
//! only decides which keys the engine gets.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod hex;
pub mod loader;
pub mod profile;
pub mod resolver;
pub mod store;

pub use dispatch::{inspect, Command, Dispatcher, KeystoreReport, ProfileReport};
pub use engine::ContainerEngine;
pub use error::{CommandError, HexError, KeystoreError};
pub use profile::{HeaderKind, KeyField, KeyProfile, ProfileKind};
pub use resolver::KeystoreResolver;
pub use store::KeyProfileStore;
