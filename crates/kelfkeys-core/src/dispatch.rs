//! Command dispatch
//!
//! Each command runs the same fixed sequence and stops at the first failure:
//! profile kind, header (encrypt only), keystore load, profile lookup, then
//! the two engine calls.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::engine::ContainerEngine;
use crate::error::{CommandError, KeystoreError};
use crate::profile::{HeaderKind, KeyProfile, ProfileKind, KEY_TABLE};
use crate::resolver::KeystoreResolver;
use crate::store::KeyProfileStore;

/// A parsed user request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Decrypt and verify a container
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        /// `-k` value; `None` means retail
        kind: Option<String>,
    },
    /// Encrypt and sign a payload
    Encrypt {
        /// Raw header token (`fmcb`, `fhdb`, `mbr`, `bmcc`)
        header: String,
        input: PathBuf,
        output: PathBuf,
        kind: Option<String>,
    },
}

pub struct Dispatcher<E> {
    engine: E,
    resolver: KeystoreResolver,
}

impl<E: ContainerEngine> Dispatcher<E> {
    pub fn new(engine: E, resolver: KeystoreResolver) -> Self {
        Self { engine, resolver }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn run(&self, command: &Command) -> Result<(), CommandError> {
        match command {
            Command::Decrypt { input, output, kind } => {
                self.decrypt(input, output, kind.as_deref())
            }
            Command::Encrypt { header, input, output, kind } => {
                self.encrypt(header, input, output, kind.as_deref())
            }
        }
    }

    pub fn decrypt(
        &self,
        input: &Path,
        output: &Path,
        kind: Option<&str>,
    ) -> Result<(), CommandError> {
        let kind = resolve_kind(kind)?;
        let store = self.resolver.load()?;
        let profile = select(&store, kind)?;

        info!(%kind, input = %input.display(), "decrypting container");
        let container = self
            .engine
            .load_container(profile, input)
            .map_err(transform("load container"))?;
        self.engine
            .save_content(&container, output)
            .map_err(transform("save content"))?;
        info!(output = %output.display(), "content written");
        Ok(())
    }

    pub fn encrypt(
        &self,
        header: &str,
        input: &Path,
        output: &Path,
        kind: Option<&str>,
    ) -> Result<(), CommandError> {
        let kind = resolve_kind(kind)?;
        let header_kind = HeaderKind::from_token(header);
        // Arcade containers have no selectable header
        if kind != ProfileKind::Arcade && header_kind.is_none() {
            return Err(CommandError::UnknownHeaderKind(header.to_string()));
        }

        let store = self.resolver.load()?;
        let profile = select(&store, kind)?;

        info!(%kind, header = ?header_kind, input = %input.display(), "encrypting content");
        let container = self
            .engine
            .load_content(profile, input, header_kind)
            .map_err(transform("load content"))?;
        self.engine
            .save_container(&container, header_kind, output)
            .map_err(transform("save container"))?;
        info!(output = %output.display(), "container written");
        Ok(())
    }
}

fn resolve_kind(token: Option<&str>) -> Result<ProfileKind, CommandError> {
    token.map_or(Ok(ProfileKind::Retail), |t| t.parse())
}

fn select(store: &KeyProfileStore, kind: ProfileKind) -> Result<&KeyProfile, CommandError> {
    store.get(kind).ok_or_else(|| CommandError::ProfileNotFound {
        kind,
        path: store.source().to_path_buf(),
    })
}

fn transform<T>(stage: &'static str) -> impl FnOnce(T) -> CommandError
where
    T: std::error::Error + Send + Sync + 'static,
{
    move |e| {
        warn!(stage, error = %e, "container engine failed");
        CommandError::Transform { stage, source: Box::new(e) }
    }
}

/// What a keystore holds, without key bytes
#[derive(Debug, Serialize)]
pub struct KeystoreReport {
    pub path: PathBuf,
    pub profiles: Vec<ProfileReport>,
}

#[derive(Debug, Serialize)]
pub struct ProfileReport {
    pub kind: ProfileKind,
    pub keys: Vec<KeyLength>,
}

#[derive(Debug, Serialize)]
pub struct KeyLength {
    pub name: &'static str,
    pub bytes: usize,
}

/// Load the keystore the commands would use and summarize it
pub fn inspect(resolver: &KeystoreResolver) -> Result<KeystoreReport, KeystoreError> {
    let store = resolver.load()?;
    let profiles = store
        .profiles()
        .map(|profile| ProfileReport {
            kind: profile.kind(),
            keys: KEY_TABLE
                .iter()
                .filter(|(_, field, _)| field.required_for(profile.kind()))
                .map(|(name, field, _)| KeyLength { name: *name, bytes: profile.get(*field).len() })
                .collect(),
        })
        .collect();

    Ok(KeystoreReport { path: store.source().to_path_buf(), profiles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    use tempfile::TempDir;

    use crate::loader::tests::{keystore, section_body};

    #[derive(Debug, thiserror::Error, PartialEq, Eq)]
    #[error("engine failure: {0}")]
    struct EngineFailure(String);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        LoadContainer { kind: ProfileKind, path: PathBuf },
        SaveContent { from: PathBuf, path: PathBuf },
        LoadContent { kind: ProfileKind, path: PathBuf, header: Option<HeaderKind> },
        SaveContainer { from: PathBuf, header: Option<HeaderKind>, path: PathBuf },
    }

    /// Records every call; fails the stage named in `fail_at`
    #[derive(Default)]
    struct RecordingEngine {
        calls: RefCell<Vec<Call>>,
        fail_at: Option<&'static str>,
    }

    impl RecordingEngine {
        fn failing(stage: &'static str) -> Self {
            Self { calls: RefCell::default(), fail_at: Some(stage) }
        }

        fn check(&self, stage: &'static str) -> Result<(), EngineFailure> {
            if self.fail_at == Some(stage) {
                return Err(EngineFailure(stage.to_string()));
            }
            Ok(())
        }
    }

    impl ContainerEngine for RecordingEngine {
        type Container = PathBuf;
        type Error = EngineFailure;

        fn load_container(&self, profile: &KeyProfile, path: &Path) -> Result<PathBuf, EngineFailure> {
            assert!(profile.is_valid());
            self.calls.borrow_mut().push(Call::LoadContainer {
                kind: profile.kind(),
                path: path.to_path_buf(),
            });
            self.check("load_container")?;
            Ok(path.to_path_buf())
        }

        fn save_content(&self, container: &PathBuf, path: &Path) -> Result<(), EngineFailure> {
            self.calls.borrow_mut().push(Call::SaveContent {
                from: container.clone(),
                path: path.to_path_buf(),
            });
            self.check("save_content")
        }

        fn load_content(
            &self,
            profile: &KeyProfile,
            path: &Path,
            header: Option<HeaderKind>,
        ) -> Result<PathBuf, EngineFailure> {
            assert!(profile.is_valid());
            self.calls.borrow_mut().push(Call::LoadContent {
                kind: profile.kind(),
                path: path.to_path_buf(),
                header,
            });
            self.check("load_content")?;
            Ok(path.to_path_buf())
        }

        fn save_container(
            &self,
            container: &PathBuf,
            header: Option<HeaderKind>,
            path: &Path,
        ) -> Result<(), EngineFailure> {
            self.calls.borrow_mut().push(Call::SaveContainer {
                from: container.clone(),
                header,
                path: path.to_path_buf(),
            });
            self.check("save_container")
        }
    }

    fn write_keystore(sections: &[(&str, String)]) -> (TempDir, KeystoreResolver) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PS2KEYS.dat");
        fs::write(&path, keystore(sections)).unwrap();
        (dir, KeystoreResolver::explicit(path))
    }

    fn full_keystore() -> (TempDir, KeystoreResolver) {
        write_keystore(&[
            ("Retail", section_body(false)),
            ("Dev", section_body(false)),
            ("Arcade", section_body(true)),
        ])
    }

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_decrypt_defaults_to_retail() {
        let (_dir, resolver) = write_keystore(&[("Retail", section_body(false))]);
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        dispatcher
            .run(&Command::Decrypt { input: p("input.bin"), output: p("output.bin"), kind: None })
            .unwrap();

        assert_eq!(
            *dispatcher.engine().calls.borrow(),
            vec![
                Call::LoadContainer { kind: ProfileKind::Retail, path: p("input.bin") },
                Call::SaveContent { from: p("input.bin"), path: p("output.bin") },
            ]
        );
    }

    #[test]
    fn test_decrypt_transform_error_passes_through() {
        let (_dir, resolver) = write_keystore(&[("Retail", section_body(false))]);
        let dispatcher = Dispatcher::new(RecordingEngine::failing("load_container"), resolver);

        let err = dispatcher.decrypt(&p("input.bin"), &p("output.bin"), None).unwrap_err();
        assert_eq!(err.exit_code(), 30);
        match err {
            CommandError::Transform { stage, source } => {
                assert_eq!(stage, "load container");
                assert_eq!(
                    source.downcast_ref::<EngineFailure>(),
                    Some(&EngineFailure("load_container".into()))
                );
            }
            other => panic!("expected Transform, got {other:?}"),
        }
        // save_content never ran
        assert_eq!(dispatcher.engine().calls.borrow().len(), 1);
    }

    #[test]
    fn test_transform_error_displays_engine_message() {
        let (_dir, resolver) = write_keystore(&[("Retail", section_body(false))]);
        let dispatcher = Dispatcher::new(RecordingEngine::failing("save_content"), resolver);

        let err = dispatcher.decrypt(&p("input.bin"), &p("output.bin"), None).unwrap_err();
        assert_eq!(err.to_string(), EngineFailure("save_content".into()).to_string());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_decrypt_selects_requested_kind() {
        let (_dir, resolver) = full_keystore();
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        dispatcher.decrypt(&p("in"), &p("out"), Some("dev")).unwrap();
        assert_eq!(
            dispatcher.engine().calls.borrow()[0],
            Call::LoadContainer { kind: ProfileKind::Dev, path: p("in") }
        );
    }

    #[test]
    fn test_unknown_profile_kind_fails_before_keystore() {
        // The resolver points nowhere; the kind check must fire first
        let resolver = KeystoreResolver::explicit("/nonexistent/PS2KEYS.dat");
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        let err = dispatcher.decrypt(&p("in"), &p("out"), Some("Retail")).unwrap_err();
        assert!(matches!(err, CommandError::UnknownProfileKind(ref t) if t == "Retail"));
        assert!(dispatcher.engine().calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_profile_is_lookup_failure() {
        let (_dir, resolver) = write_keystore(&[("Retail", section_body(false))]);
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        let err = dispatcher.decrypt(&p("in"), &p("out"), Some("proto")).unwrap_err();
        assert!(matches!(err, CommandError::ProfileNotFound { kind: ProfileKind::Proto, .. }));
        assert!(dispatcher.engine().calls.borrow().is_empty());
    }

    #[test]
    fn test_keystore_errors_propagate() {
        let (_dir, resolver) = write_keystore(&[("Retail", "MG_KC_IV=ABC\n".to_string())]);
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        let err = dispatcher.decrypt(&p("in"), &p("out"), None).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Keystore(KeystoreError::OddLengthValue { .. })
        ));
        assert_eq!(err.exit_code(), 12);
    }

    #[test]
    fn test_encrypt_calls_engine_with_header() {
        let (_dir, resolver) = full_keystore();
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        dispatcher
            .run(&Command::Encrypt {
                header: "fhdb".into(),
                input: p("payload.elf"),
                output: p("out.kelf"),
                kind: None,
            })
            .unwrap();

        assert_eq!(
            *dispatcher.engine().calls.borrow(),
            vec![
                Call::LoadContent {
                    kind: ProfileKind::Retail,
                    path: p("payload.elf"),
                    header: Some(HeaderKind::FreeHDBoot),
                },
                Call::SaveContainer {
                    from: p("payload.elf"),
                    header: Some(HeaderKind::FreeHDBoot),
                    path: p("out.kelf"),
                },
            ]
        );
    }

    #[test]
    fn test_encrypt_unknown_header_rejected_for_retail() {
        let (_dir, resolver) = full_keystore();
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        let err = dispatcher
            .encrypt("psx", &p("in"), &p("out"), Some("retail"))
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownHeaderKind(ref t) if t == "psx"));
        assert_eq!(err.exit_code(), 22);
        assert!(dispatcher.engine().calls.borrow().is_empty());
    }

    #[test]
    fn test_encrypt_unknown_header_allowed_for_arcade() {
        let (_dir, resolver) = full_keystore();
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        dispatcher.encrypt("psx", &p("in"), &p("out"), Some("arcade")).unwrap();
        assert_eq!(
            dispatcher.engine().calls.borrow()[0],
            Call::LoadContent { kind: ProfileKind::Arcade, path: p("in"), header: None }
        );
    }

    #[test]
    fn test_encrypt_arcade_keeps_known_header() {
        let (_dir, resolver) = full_keystore();
        let dispatcher = Dispatcher::new(RecordingEngine::default(), resolver);

        dispatcher.encrypt("bmcc", &p("in"), &p("out"), Some("arcade")).unwrap();
        assert_eq!(
            dispatcher.engine().calls.borrow()[1],
            Call::SaveContainer {
                from: p("in"),
                header: Some(HeaderKind::BootMcCade),
                path: p("out"),
            }
        );
    }

    #[test]
    fn test_encrypt_save_failure_reports_stage() {
        let (_dir, resolver) = full_keystore();
        let dispatcher = Dispatcher::new(RecordingEngine::failing("save_container"), resolver);

        let err = dispatcher.encrypt("mbr", &p("in"), &p("out"), None).unwrap_err();
        assert!(matches!(err, CommandError::Transform { stage: "save container", .. }));
        assert_eq!(dispatcher.engine().calls.borrow().len(), 2);
    }

    #[test]
    fn test_inspect_reports_lengths_only() {
        let (_dir, resolver) = full_keystore();
        let report = inspect(&resolver).unwrap();

        let kinds: Vec<_> = report.profiles.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProfileKind::Retail, ProfileKind::Dev, ProfileKind::Arcade]);
        assert_eq!(report.profiles[0].keys.len(), 10);
        assert_eq!(report.profiles[2].keys.len(), 12);
        assert!(report.profiles.iter().flat_map(|p| &p.keys).all(|k| k.bytes == 16));
    }
}
