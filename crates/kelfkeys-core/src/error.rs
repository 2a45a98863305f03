//! Error types shared across the crate

use std::path::PathBuf;

use thiserror::Error;

use crate::profile::ProfileKind;

/// Hex codec failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("odd length hex string ({0} characters)")]
    OddLength(usize),

    #[error("invalid hex character {ch:?} at offset {offset}")]
    InvalidChar { ch: char, offset: usize },
}

/// Failures while locating, reading or validating a keystore
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("failed to open keystore {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("line {line} in keystore {path} is not a key=value pair")]
    LineNotKeyValue { path: PathBuf, line: usize },

    #[error("odd length hex value for {key} in section '{section}'")]
    OddLengthValue { section: String, key: String },

    #[error("invalid hex value for {key} in section '{section}': {source}")]
    InvalidEncoding {
        section: String,
        key: String,
        #[source]
        source: HexError,
    },

    #[error("keystore section '{section}' is missing required keys: {}{}", .missing.join(", "), arcade_note(.arcade))]
    MissingKey {
        section: String,
        missing: Vec<&'static str>,
        arcade: bool,
    },
}

fn arcade_note(arcade: &bool) -> &'static str {
    if *arcade {
        " (arcade also requires ARCADE_KBIT and ARCADE_KC)"
    } else {
        ""
    }
}

impl KeystoreError {
    /// True for the "cannot open" class, the only class the resolver retries
    pub fn is_open_failure(&self) -> bool {
        matches!(self, KeystoreError::OpenFailed { .. })
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            KeystoreError::OpenFailed { .. } => 10,
            KeystoreError::LineNotKeyValue { .. } => 11,
            KeystoreError::OddLengthValue { .. } => 12,
            KeystoreError::InvalidEncoding { .. } => 13,
            KeystoreError::MissingKey { .. } => 14,
        }
    }
}

/// Failures while dispatching a decrypt or encrypt command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid keystore type '{0}', options are: retail, dev, proto, arcade")]
    UnknownProfileKind(String),

    #[error("invalid header '{0}', options are: fmcb, fhdb, mbr, bmcc")]
    UnknownHeaderKind(String),

    #[error("keystore {path} has no {kind} section")]
    ProfileNotFound { kind: ProfileKind, path: PathBuf },

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    /// Engine failure, displayed as the engine reported it
    #[error("{source}")]
    Transform {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CommandError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::UnknownCommand(_) => 2,
            CommandError::UnknownProfileKind(_) => 20,
            CommandError::ProfileNotFound { .. } => 21,
            CommandError::UnknownHeaderKind(_) => 22,
            CommandError::Keystore(e) => e.exit_code(),
            CommandError::Transform { .. } => 30,
        }
    }
}
